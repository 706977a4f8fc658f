// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod common;

use common::{put_u16, put_u32, PeBuilder, TestSource, FILE_ALIGNMENT, IMAGE_BASE, NT_OFFSET};
use object::pe::{
    ImageExportDirectory, IMAGE_DIRECTORY_ENTRY_EXPORT,
    IMAGE_DIRECTORY_ENTRY_IMPORT,
};
use object::LittleEndian;
use peaccess::{
    section_name, HeaderError, ImageReader, OffsetResolver, PeHeaders,
    ReadError,
};

fn export_table(name_rva: u32) -> Vec<u8> {
    let mut dir = vec![0u8; 40];
    dir[12..16].copy_from_slice(&name_rva.to_le_bytes());
    dir[16..20].copy_from_slice(&1u32.to_le_bytes());
    dir
}

fn sample_image(is_64: bool) -> Vec<u8> {
    let mut rdata = export_table(0x2040);
    rdata.resize(0x40, 0);
    rdata.extend_from_slice(b"sample.dll\0");

    PeBuilder::new(is_64)
        .section(b".text", 0x1000, 0x80, 0x200, &[0xcc; 0x80])
        .section(b".rdata", 0x2000, 0x100, 0x400, &rdata)
        .directory(IMAGE_DIRECTORY_ENTRY_EXPORT, 0x2000, 40)
        .build()
}

#[test]
fn test_parse_pe64() {
    let data = sample_image(true);
    let source = TestSource::new(&data);
    let reader = ImageReader::new(&source, source.len());
    let headers = PeHeaders::parse(&reader).unwrap();

    assert_eq!(headers.nt_offset(), NT_OFFSET);
    assert_eq!(headers.signature(), 0x4550);
    assert_eq!(headers.dos_header().e_magic.get(LittleEndian), 0x5a4d);
    assert_eq!(headers.file_header().machine.get(LittleEndian), 0x8664);

    let optional = headers.optional_header();
    assert!(optional.is_64());
    assert_eq!(optional.magic(), 0x20b);
    assert_eq!(optional.image_base(), IMAGE_BASE);
    assert_eq!(optional.file_alignment(), FILE_ALIGNMENT);
    assert_eq!(optional.size_of_headers(), FILE_ALIGNMENT);
    assert_eq!(optional.address_of_entry_point(), 0x1000);

    assert_eq!(headers.data_directories().len(), 16);
    let export = headers.data_directory(IMAGE_DIRECTORY_ENTRY_EXPORT).unwrap();
    assert_eq!(export.virtual_address.get(LittleEndian), 0x2000);
    assert_eq!(export.size.get(LittleEndian), 40);
    let import = headers.data_directory(IMAGE_DIRECTORY_ENTRY_IMPORT).unwrap();
    assert_eq!(import.virtual_address.get(LittleEndian), 0);
    assert!(headers.data_directory(16).is_none());

    let sections = headers.sections();
    assert_eq!(sections.len(), 2);
    let names: Vec<&[u8]> = sections.iter().map(section_name).collect();
    assert_eq!(names, [&b".text"[..], &b".rdata"[..]]);
}

#[test]
fn test_parse_pe32() {
    let data = sample_image(false);
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);
    let headers = PeHeaders::parse(&reader).unwrap();

    let optional = headers.optional_header();
    assert!(!optional.is_64());
    assert_eq!(optional.magic(), 0x10b);
    assert_eq!(optional.image_base(), IMAGE_BASE & 0xffff_ffff);
    assert_eq!(headers.file_header().machine.get(LittleEndian), 0x14c);
    assert_eq!(headers.sections().len(), 2);
}

#[test]
fn test_export_name_through_headers() {
    for is_64 in [false, true] {
        let data = sample_image(is_64);
        let reader = ImageReader::new(data.as_slice(), data.len() as u32);
        let headers = PeHeaders::parse(&reader).unwrap();
        let resolver = headers.sections();

        let export_rva = headers
            .data_directory(IMAGE_DIRECTORY_ENTRY_EXPORT)
            .unwrap()
            .virtual_address
            .get(LittleEndian);
        let export = reader
            .read_record_at_rva::<ImageExportDirectory, _>(resolver, export_rva)
            .unwrap();
        let name_rva = export.name.get(LittleEndian);
        assert_eq!(name_rva, 0x2040);
        assert_eq!(
            reader.read_string_at_rva(resolver, name_rva).unwrap(),
            b"sample.dll"
        );
    }
}

#[test]
fn test_fewer_data_directories() {
    let mut builder = PeBuilder::new(true)
        .section(b".text", 0x1000, 0x10, 0x200, &[0x90; 0x10]);
    builder.number_of_rva_and_sizes = 2;
    let data = builder.build();
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);
    let headers = PeHeaders::parse(&reader).unwrap();

    assert_eq!(headers.data_directories().len(), 2);
    assert!(headers.data_directory(IMAGE_DIRECTORY_ENTRY_IMPORT).is_some());
    assert!(headers.data_directory(2).is_none());
    assert_eq!(headers.sections().len(), 1);
}

#[test]
fn test_oversized_data_directory_count_is_capped() {
    let mut data = PeBuilder::new(true).build();
    // NumberOfRvaAndSizes, while SizeOfOptionalHeader stays at 16 entries.
    put_u32(&mut data, NT_OFFSET as usize + 24 + 108, 0x1000_0000);
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);

    let headers = PeHeaders::parse(&reader).unwrap();
    assert_eq!(headers.data_directories().len(), 16);
}

#[test]
fn test_unknown_magic() {
    let mut data = sample_image(true);
    put_u16(&mut data, NT_OFFSET as usize + 24, 0x107);
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);
    assert_eq!(
        PeHeaders::parse(&reader).unwrap_err(),
        HeaderError::UnknownOptionalHeaderMagic(0x107)
    );
}

#[test]
fn test_truncated_images() {
    let data = sample_image(true);
    let section_table_end = PeBuilder::new(true).section_table_offset() + 2 * 40;

    // Every prefix that cuts into the headers fails cleanly.
    for len in [0, 10, 0x3f, 0x44, 0x60, 0x100, section_table_end - 1] {
        let reader = ImageReader::new(data.as_slice(), len);
        let err = PeHeaders::parse(&reader).unwrap_err();
        assert!(
            matches!(err, HeaderError::Read(ReadError::OutOfBounds { .. })),
            "len {len:#x}: {err:?}"
        );
    }

    let reader = ImageReader::new(data.as_slice(), section_table_end);
    assert!(PeHeaders::parse(&reader).is_ok());
}

#[test]
fn test_hostile_lfanew() {
    let mut data = sample_image(true);
    data[0x3c..0x40].copy_from_slice(&0xffff_fff0u32.to_le_bytes());
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);
    assert!(matches!(
        PeHeaders::parse(&reader).unwrap_err(),
        HeaderError::Overflow | HeaderError::Read(ReadError::Overflow { .. })
    ));

    data[0x3c..0x40].copy_from_slice(&0x7fff_0000u32.to_le_bytes());
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);
    assert!(matches!(
        PeHeaders::parse(&reader).unwrap_err(),
        HeaderError::Read(ReadError::OutOfBounds { .. })
    ));
}

#[test]
fn test_headers_resolver_maps_header_region() {
    let data = sample_image(true);
    let reader = ImageReader::new(data.as_slice(), data.len() as u32);
    let headers = PeHeaders::parse(&reader).unwrap();

    // RVA 0x3c is in the headers, which map to themselves.
    assert_eq!(headers.sections().resolve_offset(0x3c).unwrap(), 0x3c);
    assert_eq!(
        reader.read_u32_at_rva(headers.sections(), 0x3c).unwrap(),
        NT_OFFSET
    );
}
