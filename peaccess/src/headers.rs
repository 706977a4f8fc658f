// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{ByteSource, ImageReader, ReadError, SectionTable};
use alloc::vec::Vec;
use core::fmt::{self, Display, Formatter};
use core::mem;
use object::pe::{
    ImageDataDirectory, ImageDosHeader, ImageFileHeader,
    ImageNtHeaders32, ImageNtHeaders64, ImageOptionalHeader32,
    ImageOptionalHeader64, IMAGE_NT_OPTIONAL_HDR32_MAGIC,
    IMAGE_NT_OPTIONAL_HDR64_MAGIC, IMAGE_NUMBEROF_DIRECTORY_ENTRIES,
};
use object::LittleEndian;
use tracing::debug;

/// Size of the `Signature` field that starts the NT headers.
const SIGNATURE_SIZE: u32 = 4;

/// Error returned by [`PeHeaders::parse`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderError<E> {
    /// Reading one of the headers failed.
    Read(ReadError<E>),

    /// The optional header magic is neither PE32 nor PE32+, so the
    /// header layout is unknown.
    UnknownOptionalHeaderMagic(u16),

    /// Computing a header offset overflowed.
    Overflow,
}

impl<E> From<ReadError<E>> for HeaderError<E> {
    fn from(err: ReadError<E>) -> Self {
        Self::Read(err)
    }
}

impl<E: Display> Display for HeaderError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read PE headers: {err}"),
            Self::UnknownOptionalHeaderMagic(magic) => {
                write!(f, "unknown optional header magic: {magic:#06x}")
            }
            Self::Overflow => write!(f, "PE header offset overflowed"),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for HeaderError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            _ => None,
        }
    }
}

/// Optional header in either of its layouts.
#[derive(Clone, Copy, Debug)]
pub enum OptionalHeader {
    /// PE32 layout.
    Pe32(ImageOptionalHeader32),

    /// PE32+ layout.
    Pe64(ImageOptionalHeader64),
}

impl OptionalHeader {
    /// The `Magic` field.
    pub fn magic(&self) -> u16 {
        match self {
            Self::Pe32(h) => h.magic.get(LittleEndian),
            Self::Pe64(h) => h.magic.get(LittleEndian),
        }
    }

    /// Whether this is the PE32+ layout.
    pub fn is_64(&self) -> bool {
        matches!(self, Self::Pe64(_))
    }

    /// The `ImageBase` field, widened to 64 bits.
    pub fn image_base(&self) -> u64 {
        match self {
            Self::Pe32(h) => u64::from(h.image_base.get(LittleEndian)),
            Self::Pe64(h) => h.image_base.get(LittleEndian),
        }
    }

    /// The `FileAlignment` field.
    pub fn file_alignment(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.file_alignment.get(LittleEndian),
            Self::Pe64(h) => h.file_alignment.get(LittleEndian),
        }
    }

    /// The `SizeOfHeaders` field.
    pub fn size_of_headers(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.size_of_headers.get(LittleEndian),
            Self::Pe64(h) => h.size_of_headers.get(LittleEndian),
        }
    }

    /// The `AddressOfEntryPoint` field.
    pub fn address_of_entry_point(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.address_of_entry_point.get(LittleEndian),
            Self::Pe64(h) => h.address_of_entry_point.get(LittleEndian),
        }
    }

    /// The `NumberOfRvaAndSizes` field.
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.number_of_rva_and_sizes.get(LittleEndian),
            Self::Pe64(h) => h.number_of_rva_and_sizes.get(LittleEndian),
        }
    }

    /// Size of the fixed part of this layout, not including the data
    /// directories.
    fn fixed_size(&self) -> usize {
        match self {
            Self::Pe32(_) => mem::size_of::<ImageOptionalHeader32>(),
            Self::Pe64(_) => mem::size_of::<ImageOptionalHeader64>(),
        }
    }
}

/// The headers of a PE image, read through an [`ImageReader`].
///
/// Note that nothing is validated here: signatures, the machine type and
/// the checksum are returned as found. The optional header magic is only
/// used to pick between the PE32 and PE32+ layouts.
#[derive(Clone, Debug)]
pub struct PeHeaders {
    dos_header: ImageDosHeader,
    nt_offset: u32,
    signature: u32,
    file_header: ImageFileHeader,
    optional_header: OptionalHeader,
    data_directories: Vec<ImageDataDirectory>,
    sections: SectionTable,
}

impl PeHeaders {
    /// Read the DOS header, NT headers, data directories and section
    /// table.
    pub fn parse<S>(
        reader: &ImageReader<'_, S>,
    ) -> Result<Self, HeaderError<S::Error>>
    where
        S: ByteSource + ?Sized,
    {
        let dos_header = reader.read_record_at::<ImageDosHeader>(0)?;
        let nt_offset = dos_header.e_lfanew.get(LittleEndian);

        // The magic is the first field of the optional header, right
        // after the signature and file header.
        let optional_header_offset = nt_offset
            .checked_add(SIGNATURE_SIZE)
            .and_then(|v| v.checked_add(size_u32::<ImageFileHeader>()))
            .ok_or(HeaderError::Overflow)?;
        let magic = reader.read_u16_at(optional_header_offset)?;

        let (signature, file_header, optional_header) = match magic {
            IMAGE_NT_OPTIONAL_HDR32_MAGIC => {
                let nt = reader.read_record_at::<ImageNtHeaders32>(nt_offset)?;
                (
                    nt.signature.get(LittleEndian),
                    nt.file_header,
                    OptionalHeader::Pe32(nt.optional_header),
                )
            }
            IMAGE_NT_OPTIONAL_HDR64_MAGIC => {
                let nt = reader.read_record_at::<ImageNtHeaders64>(nt_offset)?;
                (
                    nt.signature.get(LittleEndian),
                    nt.file_header,
                    OptionalHeader::Pe64(nt.optional_header),
                )
            }
            _ => {
                debug!(magic, nt_offset, "unknown optional header magic");
                return Err(HeaderError::UnknownOptionalHeaderMagic(magic));
            }
        };

        let data_directories_offset = u32::try_from(optional_header.fixed_size())
            .ok()
            .and_then(|v| optional_header_offset.checked_add(v))
            .ok_or(HeaderError::Overflow)?;
        let num_directories = optional_header
            .number_of_rva_and_sizes()
            .min(IMAGE_NUMBEROF_DIRECTORY_ENTRIES as u32);
        let data_directories = reader.read_records_at::<ImageDataDirectory>(
            data_directories_offset,
            num_directories,
        )?;

        let section_table_offset = optional_header_offset
            .checked_add(u32::from(
                file_header.size_of_optional_header.get(LittleEndian),
            ))
            .ok_or(HeaderError::Overflow)?;
        let sections = reader.read_records_at(
            section_table_offset,
            u32::from(file_header.number_of_sections.get(LittleEndian)),
        )?;

        Ok(Self {
            dos_header,
            nt_offset,
            signature,
            file_header,
            sections: SectionTable::new(
                sections,
                optional_header.file_alignment(),
                reader.data_len(),
            ),
            optional_header,
            data_directories,
        })
    }

    /// The DOS header.
    pub fn dos_header(&self) -> &ImageDosHeader {
        &self.dos_header
    }

    /// File offset of the NT headers (`e_lfanew`).
    pub fn nt_offset(&self) -> u32 {
        self.nt_offset
    }

    /// The NT headers `Signature` field, unchecked.
    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// The COFF file header.
    pub fn file_header(&self) -> &ImageFileHeader {
        &self.file_header
    }

    /// The optional header.
    pub fn optional_header(&self) -> &OptionalHeader {
        &self.optional_header
    }

    /// Get a data directory by index, if the image has that many.
    ///
    /// See `object::pe::IMAGE_DIRECTORY_ENTRY_*` for the indices.
    pub fn data_directory(&self, index: usize) -> Option<&ImageDataDirectory> {
        self.data_directories.get(index)
    }

    /// All data directories present in the image.
    pub fn data_directories(&self) -> &[ImageDataDirectory] {
        &self.data_directories
    }

    /// The section table, which is also the image's [`OffsetResolver`].
    ///
    /// [`OffsetResolver`]: crate::OffsetResolver
    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }
}

fn size_u32<T>() -> u32 {
    // Header structures are all far smaller than 4 GiB.
    u32::try_from(mem::size_of::<T>()).unwrap_or(u32::MAX)
}
