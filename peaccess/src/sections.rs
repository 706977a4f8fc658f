// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{DataBounds, OffsetResolver, ResolveError};
use alloc::vec::Vec;
use object::pe::ImageSectionHeader;
use object::LittleEndian;

/// Raw data pointers are rounded down to this boundary when the file
/// alignment is at least this large, matching the Windows loader.
const MIN_FILE_ALIGNMENT: u32 = 0x200;

/// Get a section's name with trailing NULs removed.
pub fn section_name(section: &ImageSectionHeader) -> &[u8] {
    let end = section
        .name
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(section.name.len());
    &section.name[..end]
}

/// Section table of an image, used to translate virtual addresses.
///
/// An address inside a section maps into that section's raw data; an
/// address that no section contains maps to the same file offset as
/// long as it is inside the image, which covers the headers.
#[derive(Clone, Debug)]
pub struct SectionTable {
    sections: Vec<ImageSectionHeader>,
    file_alignment: u32,
    data_len: u32,
}

impl SectionTable {
    /// Create a section table.
    ///
    /// `file_alignment` is the optional header's `FileAlignment` and
    /// `data_len` is the total length of the image.
    pub fn new(
        sections: Vec<ImageSectionHeader>,
        file_alignment: u32,
        data_len: u32,
    ) -> Self {
        Self {
            sections,
            file_alignment,
            data_len,
        }
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the table has no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Iterate over the section headers in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageSectionHeader> {
        self.sections.iter()
    }

    /// Get the first section whose name is `name`.
    pub fn section_by_name(&self, name: &[u8]) -> Option<&ImageSectionHeader> {
        self.sections.iter().find(|s| section_name(s) == name)
    }

    /// Get the first section containing `rva`.
    ///
    /// A section spans the larger of its virtual size and its raw data
    /// size, starting at its virtual address.
    pub fn section_by_rva(&self, rva: u32) -> Option<&ImageSectionHeader> {
        self.sections.iter().find(|s| {
            let start = s.virtual_address.get(LittleEndian);
            let size = s
                .virtual_size
                .get(LittleEndian)
                .max(s.size_of_raw_data.get(LittleEndian));
            let end = start.checked_add(size).unwrap_or(u32::MAX);
            start <= rva && rva < end
        })
    }

    fn raw_data_start(&self, section: &ImageSectionHeader) -> u32 {
        let ptr = section.pointer_to_raw_data.get(LittleEndian);
        if self.file_alignment < MIN_FILE_ALIGNMENT {
            ptr
        } else {
            ptr & !(MIN_FILE_ALIGNMENT - 1)
        }
    }
}

impl OffsetResolver for SectionTable {
    fn resolve_offset(&self, rva: u32) -> Result<u32, ResolveError> {
        self.resolve_data_bounds(rva).map(|bounds| bounds.offset)
    }

    fn resolve_data_bounds(&self, rva: u32) -> Result<DataBounds, ResolveError> {
        let Some(section) = self.section_by_rva(rva) else {
            let max_len = self
                .data_len
                .checked_sub(rva)
                .filter(|&len| len > 0)
                .ok_or(ResolveError::Unmapped(rva))?;
            return Ok(DataBounds {
                offset: rva,
                max_len,
            });
        };

        let delta = rva
            .checked_sub(section.virtual_address.get(LittleEndian))
            .ok_or(ResolveError::Overflow(rva))?;
        let max_len = section
            .size_of_raw_data
            .get(LittleEndian)
            .checked_sub(delta)
            .filter(|&len| len > 0)
            .ok_or(ResolveError::NotInFile(rva))?;
        let offset = self
            .raw_data_start(section)
            .checked_add(delta)
            .ok_or(ResolveError::Overflow(rva))?;

        Ok(DataBounds { offset, max_len })
    }
}
