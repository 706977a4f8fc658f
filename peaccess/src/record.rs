// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use object::pe;
use object::pod::Pod;
use object::{LittleEndian, U16Bytes, U32Bytes, U64Bytes};

/// A fixed-layout structure that can be read out of an image.
///
/// The record size is `size_of::<Self>()`, and the bytes are copied into
/// the record in declaration order with no padding. Multi-byte fields
/// should use `object`'s little-endian field types (for example
/// [`U32Bytes<LittleEndian>`]), which gives the record an alignment of
/// one. Records with a larger alignment are not supported; the reader
/// reports them as a short read.
///
/// This is implemented for the `object::pe` header structures and for
/// the little-endian scalar types.
pub trait Record: Pod {
    /// Name used in error messages.
    const NAME: &'static str;
}

macro_rules! impl_record {
    ($($ty:ty => $name:literal,)*) => {
        $(
            impl Record for $ty {
                const NAME: &'static str = $name;
            }

            const _: () = assert!(core::mem::align_of::<$ty>() == 1);
        )*
    };
}

impl_record! {
    U16Bytes<LittleEndian> => "u16",
    U32Bytes<LittleEndian> => "u32",
    U64Bytes<LittleEndian> => "u64",
    pe::ImageDosHeader => "IMAGE_DOS_HEADER",
    pe::ImageFileHeader => "IMAGE_FILE_HEADER",
    pe::ImageOptionalHeader32 => "IMAGE_OPTIONAL_HEADER32",
    pe::ImageOptionalHeader64 => "IMAGE_OPTIONAL_HEADER64",
    pe::ImageNtHeaders32 => "IMAGE_NT_HEADERS32",
    pe::ImageNtHeaders64 => "IMAGE_NT_HEADERS64",
    pe::ImageDataDirectory => "IMAGE_DATA_DIRECTORY",
    pe::ImageSectionHeader => "IMAGE_SECTION_HEADER",
    pe::ImageExportDirectory => "IMAGE_EXPORT_DIRECTORY",
    pe::ImageImportDescriptor => "IMAGE_IMPORT_DESCRIPTOR",
    pe::ImageDelayloadDescriptor => "IMAGE_DELAYLOAD_DESCRIPTOR",
    pe::ImageResourceDirectory => "IMAGE_RESOURCE_DIRECTORY",
    pe::ImageResourceDirectoryEntry => "IMAGE_RESOURCE_DIRECTORY_ENTRY",
    pe::ImageResourceDataEntry => "IMAGE_RESOURCE_DATA_ENTRY",
    pe::ImageDebugDirectory => "IMAGE_DEBUG_DIRECTORY",
    pe::ImageBaseRelocation => "IMAGE_BASE_RELOCATION",
    pe::ImageTlsDirectory32 => "IMAGE_TLS_DIRECTORY32",
    pe::ImageTlsDirectory64 => "IMAGE_TLS_DIRECTORY64",
    pe::ImageLoadConfigDirectory32 => "IMAGE_LOAD_CONFIG_DIRECTORY32",
    pe::ImageLoadConfigDirectory64 => "IMAGE_LOAD_CONFIG_DIRECTORY64",
}
