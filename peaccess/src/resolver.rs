// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use core::fmt::{self, Display, Formatter};

/// A virtual address could not be translated to a file offset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolveError {
    /// The address is not inside any section and is past the end of
    /// the image.
    Unmapped(u32),

    /// The address is inside a section, but beyond the section's raw
    /// data, so it has no bytes in the file.
    NotInFile(u32),

    /// Translating the address overflowed.
    Overflow(u32),
}

impl ResolveError {
    /// The virtual address that failed to resolve.
    pub fn rva(&self) -> u32 {
        match self {
            Self::Unmapped(rva) | Self::NotInFile(rva) | Self::Overflow(rva) => {
                *rva
            }
        }
    }
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped(rva) => {
                write!(f, "virtual address {rva:#x} is not mapped by any section")
            }
            Self::NotInFile(rva) => {
                write!(f, "virtual address {rva:#x} has no data in the file")
            }
            Self::Overflow(rva) => {
                write!(f, "offset arithmetic overflowed for virtual address {rva:#x}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ResolveError {}

/// Location and extent of the contiguous file data backing a virtual
/// address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataBounds {
    /// File offset of the first byte.
    pub offset: u32,

    /// Number of contiguous valid bytes starting at `offset`, according
    /// to the region that contains the address. The image length may
    /// reduce this further.
    pub max_len: u32,
}

/// Trait for translating virtual addresses into file offsets.
///
/// The translation policy belongs to the implementation; the readers in
/// this crate only consume the result, and still bounds check it
/// against the image length.
pub trait OffsetResolver {
    /// Get the file offset for `rva`.
    fn resolve_offset(&self, rva: u32) -> Result<u32, ResolveError>;

    /// Get the file offset for `rva` along with how far valid data
    /// extends from there.
    fn resolve_data_bounds(&self, rva: u32) -> Result<DataBounds, ResolveError>;
}
