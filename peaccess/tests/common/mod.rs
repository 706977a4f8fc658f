// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![allow(dead_code)]

use peaccess::ByteSource;
use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory source that counts calls and returns at most
/// `max_per_read` bytes per call, to exercise partial reads.
pub struct TestSource {
    data: Vec<u8>,
    max_per_read: usize,
    reads: AtomicUsize,
}

impl TestSource {
    pub fn new(data: &[u8]) -> Self {
        Self::with_max_per_read(data, usize::MAX)
    }

    pub fn with_max_per_read(data: &[u8], max_per_read: usize) -> Self {
        Self {
            data: data.to_vec(),
            max_per_read,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> u32 {
        self.data.len().try_into().unwrap()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ByteSource for TestSource {
    type Error = Infallible;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Infallible> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let n = buf.len().min(self.max_per_read);
        self.data.as_slice().read_at(offset, &mut buf[..n])
    }
}

/// Source whose every read fails.
pub struct FailingSource;

impl ByteSource for FailingSource {
    type Error = io::Error;

    fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
    }
}

/// Source whose first read returns at most `first_read` bytes of
/// `data` and whose later reads all fail.
pub struct FailAfterFirstRead {
    data: Vec<u8>,
    first_read: usize,
    reads: AtomicUsize,
}

impl FailAfterFirstRead {
    pub fn new(data: &[u8], first_read: usize) -> Self {
        Self {
            data: data.to_vec(),
            first_read,
            reads: AtomicUsize::new(0),
        }
    }
}

impl ByteSource for FailAfterFirstRead {
    type Error = io::Error;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "device unplugged"));
        }
        let n = buf.len().min(self.first_read);
        Ok(self.data.as_slice().read_at(offset, &mut buf[..n]).unwrap())
    }
}

pub const NT_OFFSET: u32 = 0x40;
pub const FILE_ALIGNMENT: u32 = 0x200;
pub const SECTION_ALIGNMENT: u32 = 0x1000;
pub const IMAGE_BASE: u64 = 0x1_4000_0000;

pub struct TestSection {
    pub name: &'static [u8],
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub pointer_to_raw_data: u32,
    pub raw_data: Vec<u8>,
}

/// Builds small PE images with just enough header content to be
/// walked by `PeHeaders`.
pub struct PeBuilder {
    pub is_64: bool,
    pub sections: Vec<TestSection>,
    pub directories: Vec<(u32, u32)>,
    pub number_of_rva_and_sizes: u32,
}

impl PeBuilder {
    pub fn new(is_64: bool) -> Self {
        Self {
            is_64,
            sections: Vec::new(),
            directories: Vec::new(),
            number_of_rva_and_sizes: 16,
        }
    }

    pub fn section(
        mut self,
        name: &'static [u8],
        virtual_address: u32,
        virtual_size: u32,
        pointer_to_raw_data: u32,
        raw_data: &[u8],
    ) -> Self {
        self.sections.push(TestSection {
            name,
            virtual_address,
            virtual_size,
            pointer_to_raw_data,
            raw_data: raw_data.to_vec(),
        });
        self
    }

    pub fn directory(mut self, index: usize, rva: u32, size: u32) -> Self {
        if self.directories.len() <= index {
            self.directories.resize(index + 1, (0, 0));
        }
        self.directories[index] = (rva, size);
        self
    }

    pub fn optional_header_size(&self) -> u32 {
        let fixed = if self.is_64 { 112 } else { 96 };
        fixed + 8 * self.number_of_rva_and_sizes
    }

    pub fn section_table_offset(&self) -> u32 {
        NT_OFFSET + 4 + 20 + self.optional_header_size()
    }

    pub fn build(&self) -> Vec<u8> {
        let headers_end =
            self.section_table_offset() + 40 * self.sections.len() as u32;
        let mut len = headers_end.max(FILE_ALIGNMENT) as usize;
        for s in &self.sections {
            len = len.max(s.pointer_to_raw_data as usize + s.raw_data.len());
        }
        let mut data = vec![0u8; len];

        // DOS header.
        put_u16(&mut data, 0, 0x5a4d);
        put_u32(&mut data, 0x3c, NT_OFFSET);

        // Signature and file header.
        let nt = NT_OFFSET as usize;
        data[nt..nt + 4].copy_from_slice(b"PE\0\0");
        let fh = nt + 4;
        put_u16(&mut data, fh, if self.is_64 { 0x8664 } else { 0x14c });
        put_u16(&mut data, fh + 2, self.sections.len() as u16);
        put_u16(&mut data, fh + 16, self.optional_header_size() as u16);

        // Optional header.
        let oh = fh + 20;
        put_u16(&mut data, oh, if self.is_64 { 0x20b } else { 0x10b });
        put_u32(&mut data, oh + 16, 0x1000);
        if self.is_64 {
            put_u64(&mut data, oh + 24, IMAGE_BASE);
        } else {
            put_u32(&mut data, oh + 28, IMAGE_BASE as u32);
        }
        put_u32(&mut data, oh + 32, SECTION_ALIGNMENT);
        put_u32(&mut data, oh + 36, FILE_ALIGNMENT);
        put_u32(&mut data, oh + 60, FILE_ALIGNMENT);
        let (num_dirs_at, dirs_at) =
            if self.is_64 { (oh + 108, oh + 112) } else { (oh + 92, oh + 96) };
        put_u32(&mut data, num_dirs_at, self.number_of_rva_and_sizes);
        for (i, (rva, size)) in self.directories.iter().enumerate() {
            put_u32(&mut data, dirs_at + 8 * i, *rva);
            put_u32(&mut data, dirs_at + 8 * i + 4, *size);
        }

        // Section table and section data.
        let mut sh = self.section_table_offset() as usize;
        for s in &self.sections {
            data[sh..sh + s.name.len()].copy_from_slice(s.name);
            put_u32(&mut data, sh + 8, s.virtual_size);
            put_u32(&mut data, sh + 12, s.virtual_address);
            put_u32(&mut data, sh + 16, s.raw_data.len() as u32);
            put_u32(&mut data, sh + 20, s.pointer_to_raw_data);
            let raw = s.pointer_to_raw_data as usize;
            data[raw..raw + s.raw_data.len()].copy_from_slice(&s.raw_data);
            sh += 40;
        }

        data
    }
}

pub fn put_u16(data: &mut [u8], at: usize, val: u16) {
    data[at..at + 2].copy_from_slice(&val.to_le_bytes());
}

pub fn put_u32(data: &mut [u8], at: usize, val: u32) {
    data[at..at + 4].copy_from_slice(&val.to_le_bytes());
}

pub fn put_u64(data: &mut [u8], at: usize, val: u64) {
    data[at..at + 8].copy_from_slice(&val.to_le_bytes());
}
