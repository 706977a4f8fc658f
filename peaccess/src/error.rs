// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::ResolveError;
use core::fmt::{self, Display, Formatter};

/// Error returned by the [`ImageReader`] accessors.
///
/// `E` is the error type of the underlying [`ByteSource`]. Every
/// variant names the shape being read (a [`Record::NAME`] or
/// [`STRING_SHAPE`]) so that callers can report which structure is
/// unavailable.
///
/// [`ImageReader`]: crate::ImageReader
/// [`ByteSource`]: crate::ByteSource
/// [`Record::NAME`]: crate::Record::NAME
/// [`STRING_SHAPE`]: crate::STRING_SHAPE
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadError<E> {
    /// `offset + size` does not fit in a `u32`.
    Overflow {
        /// Shape being read.
        shape: &'static str,
        /// Requested file offset.
        offset: u32,
        /// Requested size in bytes.
        size: u32,
        /// Total length of the image.
        data_len: u32,
    },

    /// The request would read past the end of the image.
    OutOfBounds {
        /// Shape being read.
        shape: &'static str,
        /// Requested file offset.
        offset: u32,
        /// Requested size in bytes.
        size: u32,
        /// Total length of the image.
        data_len: u32,
    },

    /// A virtual address could not be translated to a file offset.
    ResolutionFailed(ResolveError),

    /// The byte source failed.
    Io {
        /// Shape being read.
        shape: &'static str,
        /// Requested file offset.
        offset: u32,
        /// Requested size in bytes.
        size: u32,
        /// Error from the byte source.
        source: E,
    },

    /// The byte source reported end-of-data inside a range that the
    /// image length says is valid.
    ShortRead {
        /// Shape being read.
        shape: &'static str,
        /// Requested file offset.
        offset: u32,
        /// Requested size in bytes.
        size: u32,
        /// Number of bytes the source returned.
        read: u32,
    },
}

impl<E> From<ResolveError> for ReadError<E> {
    fn from(err: ResolveError) -> Self {
        Self::ResolutionFailed(err)
    }
}

impl<E: Display> Display for ReadError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow {
                shape,
                offset,
                size,
                data_len,
            } => {
                write!(f, "overflow reading {shape}:{size:#x} at offset {offset:#x}, file length: {data_len:#x}")
            }
            Self::OutOfBounds {
                shape,
                offset,
                size,
                data_len,
            } => {
                write!(f, "{shape}:{size:#x} at offset {offset:#x} would read past the end of the file, file length: {data_len:#x}")
            }
            Self::ResolutionFailed(err) => write!(f, "{err}"),
            Self::Io {
                shape,
                offset,
                size,
                source,
            } => {
                write!(f, "I/O error reading {shape}:{size:#x} at offset {offset:#x}: {source}")
            }
            Self::ShortRead {
                shape,
                offset,
                size,
                read,
            } => {
                write!(f, "short read of {shape}:{size:#x} at offset {offset:#x}: got {read:#x} bytes")
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for ReadError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ResolutionFailed(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
