// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use alloc::vec::Vec;
use core::convert::Infallible;

/// Positioned, random-access reads over the bytes of an image.
///
/// `read_at` copies bytes starting at `offset` into `buf` and returns
/// how many were copied. A return of `0` for a non-empty `buf` is the
/// end-of-data signal. A positive count smaller than `buf.len()` is a
/// partial read; callers that need more bytes ask again at the next
/// offset. Any other failure is reported through [`ByteSource::Error`]
/// and is passed to the caller unchanged.
///
/// Implementations must not need `&mut self`, so that one image can be
/// read from several threads at once. This crate provides
/// implementations for byte slices, `Vec<u8>` and (with the `std`
/// feature on unix and windows) [`std::fs::File`].
pub trait ByteSource {
    /// Error returned when a read fails for a reason other than
    /// end-of-data.
    type Error;

    /// Read up to `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

impl ByteSource for [u8] {
    type Error = Infallible;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Infallible> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(available) = self.get(start..) else {
            return Ok(0);
        };
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

impl ByteSource for Vec<u8> {
    type Error = Infallible;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Infallible> {
        self.as_slice().read_at(offset, buf)
    }
}

#[cfg(all(feature = "std", unix))]
impl ByteSource for std::fs::File {
    type Error = std::io::Error;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

// `seek_read` moves the file cursor, but every read here is positioned,
// so the cursor is never relied upon.
#[cfg(all(feature = "std", windows))]
impl ByteSource for std::fs::File {
    type Error = std::io::Error;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}
