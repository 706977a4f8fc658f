// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bounds-checked accessors for PE images.
//!
//! This crate is the layer between a PE structure decoder and the raw
//! bytes of the image. Every read goes through [`ImageReader`], which
//! checks offset arithmetic and the image length before the
//! [`ByteSource`] is touched, so a truncated or hostile file can only
//! produce an error, never an out-of-bounds read or a panic.
//!
//! Virtual addresses are translated by an [`OffsetResolver`];
//! [`SectionTable`] is the section-table based implementation, and
//! [`PeHeaders`] reads the headers needed to build one.
//!
//! Reference:
//! <https://docs.microsoft.com/en-us/windows/win32/debug/pe-format>

#![forbid(unsafe_code)]
// Allow using `std` if the `std` feature is enabled, or when running
// tests. Otherwise enable `no_std`.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]
#![warn(clippy::arithmetic_side_effects)]
#![warn(missing_docs)]

extern crate alloc;

mod config;
mod error;
mod headers;
mod reader;
mod record;
mod resolver;
mod sections;
mod source;

use core::convert::TryInto;

pub use config::{
    ReaderConfig, StringStrategy, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_STRING_LEN,
};
pub use error::ReadError;
pub use headers::{HeaderError, OptionalHeader, PeHeaders};
pub use reader::{ImageReader, STRING_SHAPE};
pub use record::Record;
pub use resolver::{DataBounds, OffsetResolver, ResolveError};
pub use sections::{section_name, SectionTable};
pub use source::ByteSource;

/// Convert a `u32` to a `usize`, panicking if the value does not fit.
///
/// This can only panic on targets where `usize` is smaller than 32
/// bits, which is not considered a supported use case by this library.
fn usize_from_u32(val: u32) -> usize {
    val.try_into().unwrap()
}
