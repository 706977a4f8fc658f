// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::usize_from_u32;
use crate::{
    ByteSource, OffsetResolver, ReadError, ReaderConfig, Record,
    StringStrategy,
};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{self, Debug, Formatter};
use core::mem;
use object::pod;
use object::{LittleEndian, U16Bytes, U32Bytes, U64Bytes};
use tracing::{debug, trace};

/// Shape name used in errors from the string readers.
pub const STRING_SHAPE: &str = "ASCII string";

/// Read-only view of a PE image.
///
/// The reader pairs a [`ByteSource`] with the total length of the image,
/// which the caller has already established. Every accessor checks its
/// request against that length before issuing any read: a fixed-size
/// read that would wrap or run past the end fails without touching the
/// source.
///
/// The reader holds no mutable state, so it is `Copy` and can be shared
/// between threads whenever the source can.
pub struct ImageReader<'a, S: ?Sized> {
    source: &'a S,
    data_len: u32,
    config: ReaderConfig,
}

impl<S: ?Sized> Clone for ImageReader<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for ImageReader<'_, S> {}

impl<S: ?Sized> Debug for ImageReader<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageReader")
            .field("data_len", &self.data_len)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a, S> ImageReader<'a, S>
where
    S: ByteSource + ?Sized,
{
    /// Create a reader over `data_len` bytes of `source` with the
    /// default [`ReaderConfig`].
    pub fn new(source: &'a S, data_len: u32) -> Self {
        Self::with_config(source, data_len, ReaderConfig::default())
    }

    /// Create a reader with an explicit configuration.
    pub fn with_config(
        source: &'a S,
        data_len: u32,
        config: ReaderConfig,
    ) -> Self {
        Self {
            source,
            data_len,
            config,
        }
    }

    /// Total length of the image in bytes.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// The reader's configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The underlying byte source.
    pub fn source(&self) -> &'a S {
        self.source
    }

    /// Read a `T` at file offset `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Overflow`] if `offset + size_of::<T>()`
    /// wraps, and [`ReadError::OutOfBounds`] if it is past the end of
    /// the image; no read is issued in either case. Source failures are
    /// returned as [`ReadError::Io`], and a source that runs out of data
    /// early as [`ReadError::ShortRead`].
    pub fn read_record_at<T: Record>(
        &self,
        offset: u32,
    ) -> Result<T, ReadError<S::Error>> {
        let size = self.record_size::<T>(T::NAME, offset, 1)?;
        let buf = self.read_exact(T::NAME, offset, size)?;
        decode(&buf, offset, size)
    }

    /// Read a `T` at virtual address `rva`, translated by `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::ResolutionFailed`] if `rva` does not map to
    /// the file, otherwise the same errors as [`Self::read_record_at`].
    pub fn read_record_at_rva<T, R>(
        &self,
        resolver: &R,
        rva: u32,
    ) -> Result<T, ReadError<S::Error>>
    where
        T: Record,
        R: OffsetResolver + ?Sized,
    {
        let offset = resolver.resolve_offset(rva)?;
        self.read_record_at(offset)
    }

    /// Read `count` consecutive `T`s starting at file offset `offset`.
    ///
    /// The whole array is bounds checked up front, so either every
    /// record is returned or none is.
    pub fn read_records_at<T: Record>(
        &self,
        offset: u32,
        count: u32,
    ) -> Result<Vec<T>, ReadError<S::Error>> {
        let size = self.record_size::<T>(T::NAME, offset, count)?;
        let buf = self.read_exact(T::NAME, offset, size)?;
        buf.chunks_exact(mem::size_of::<T>())
            .map(|bytes| decode(bytes, offset, size))
            .collect()
    }

    /// Read a little-endian `u16` at file offset `offset`.
    pub fn read_u16_at(&self, offset: u32) -> Result<u16, ReadError<S::Error>> {
        self.read_record_at::<U16Bytes<LittleEndian>>(offset)
            .map(|v| v.get(LittleEndian))
    }

    /// Read a little-endian `u32` at file offset `offset`.
    pub fn read_u32_at(&self, offset: u32) -> Result<u32, ReadError<S::Error>> {
        self.read_record_at::<U32Bytes<LittleEndian>>(offset)
            .map(|v| v.get(LittleEndian))
    }

    /// Read a little-endian `u64` at file offset `offset`.
    pub fn read_u64_at(&self, offset: u32) -> Result<u64, ReadError<S::Error>> {
        self.read_record_at::<U64Bytes<LittleEndian>>(offset)
            .map(|v| v.get(LittleEndian))
    }

    /// Read a little-endian `u16` at virtual address `rva`.
    pub fn read_u16_at_rva<R: OffsetResolver + ?Sized>(
        &self,
        resolver: &R,
        rva: u32,
    ) -> Result<u16, ReadError<S::Error>> {
        self.read_record_at_rva::<U16Bytes<LittleEndian>, R>(resolver, rva)
            .map(|v| v.get(LittleEndian))
    }

    /// Read a little-endian `u32` at virtual address `rva`.
    pub fn read_u32_at_rva<R: OffsetResolver + ?Sized>(
        &self,
        resolver: &R,
        rva: u32,
    ) -> Result<u32, ReadError<S::Error>> {
        self.read_record_at_rva::<U32Bytes<LittleEndian>, R>(resolver, rva)
            .map(|v| v.get(LittleEndian))
    }

    /// Read a little-endian `u64` at virtual address `rva`.
    pub fn read_u64_at_rva<R: OffsetResolver + ?Sized>(
        &self,
        resolver: &R,
        rva: u32,
    ) -> Result<u64, ReadError<S::Error>> {
        self.read_record_at_rva::<U64Bytes<LittleEndian>, R>(resolver, rva)
            .map(|v| v.get(LittleEndian))
    }

    /// Read a NUL-terminated ASCII string at file offset `offset`.
    ///
    /// At most `max_len` bytes are examined, further limited by
    /// [`ReaderConfig::max_string_len`] and by the end of the image.
    /// Running into the end of the image is not an error. The result
    /// holds the bytes before the first NUL, or every examined byte if
    /// there is no NUL; the terminator is never included.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::OutOfBounds`] if `offset` is past the end of
    /// the image (no read is issued), or [`ReadError::Io`] if the source
    /// fails.
    pub fn read_string_at(
        &self,
        offset: u32,
        max_len: u32,
    ) -> Result<Vec<u8>, ReadError<S::Error>> {
        let Some(available) = self.data_len.checked_sub(offset) else {
            debug!(offset, max_len, data_len = self.data_len, "string offset past end of image");
            return Err(ReadError::OutOfBounds {
                shape: STRING_SHAPE,
                offset,
                size: max_len,
                data_len: self.data_len,
            });
        };
        let len = max_len.min(self.config.max_string_len).min(available);
        trace!(offset, len, "reading string");

        match self.config.string_strategy {
            StringStrategy::Bulk => self.scan_bulk(offset, len),
            StringStrategy::Chunked { chunk_size } => {
                self.scan_chunked(offset, len, chunk_size.max(1))
            }
        }
    }

    /// Read a NUL-terminated ASCII string at virtual address `rva`.
    ///
    /// The resolver decides how far valid data extends from `rva` (for
    /// example to the end of the containing section), and that length
    /// is used as the cap for [`Self::read_string_at`].
    pub fn read_string_at_rva<R: OffsetResolver + ?Sized>(
        &self,
        resolver: &R,
        rva: u32,
    ) -> Result<Vec<u8>, ReadError<S::Error>> {
        self.read_string_at_rva_with_max(resolver, rva, u32::MAX)
    }

    /// Like [`Self::read_string_at_rva`], but examining at most
    /// `max_len` bytes even when the resolved region is longer.
    pub fn read_string_at_rva_with_max<R: OffsetResolver + ?Sized>(
        &self,
        resolver: &R,
        rva: u32,
        max_len: u32,
    ) -> Result<Vec<u8>, ReadError<S::Error>> {
        let bounds = resolver.resolve_data_bounds(rva)?;
        self.read_string_at(bounds.offset, bounds.max_len.min(max_len))
    }

    /// Size in bytes of `count` records of type `T` at `offset`, after
    /// checking the range against the image.
    fn record_size<T>(
        &self,
        shape: &'static str,
        offset: u32,
        count: u32,
    ) -> Result<u32, ReadError<S::Error>> {
        let size = u32::try_from(mem::size_of::<T>())
            .ok()
            .and_then(|size| size.checked_mul(count));
        let Some(size) = size else {
            debug!(shape, offset, count, "record size overflows");
            return Err(ReadError::Overflow {
                shape,
                offset,
                size: u32::MAX,
                data_len: self.data_len,
            });
        };

        let Some(end) = offset.checked_add(size) else {
            debug!(shape, offset, size, "record end overflows");
            return Err(ReadError::Overflow {
                shape,
                offset,
                size,
                data_len: self.data_len,
            });
        };
        if end > self.data_len {
            debug!(shape, offset, size, data_len = self.data_len, "record past end of image");
            return Err(ReadError::OutOfBounds {
                shape,
                offset,
                size,
                data_len: self.data_len,
            });
        }
        Ok(size)
    }

    /// Read exactly `size` bytes at `offset`. The range must already be
    /// bounds checked.
    fn read_exact(
        &self,
        shape: &'static str,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ReadError<S::Error>> {
        trace!(shape, offset, size, "reading record");
        let mut buf = vec![0; usize_from_u32(size)];
        let filled = self.fill(shape, offset, size, &mut buf)?;
        if filled < buf.len() {
            return Err(ReadError::ShortRead {
                shape,
                offset,
                size,
                read: u32::try_from(filled).unwrap_or(u32::MAX),
            });
        }
        Ok(buf)
    }

    /// Read into `buf` until it is full or the source reports
    /// end-of-data, returning the number of bytes read. Partial reads
    /// are continued. `size` is the size of the whole request, used in
    /// errors.
    fn fill(
        &self,
        shape: &'static str,
        offset: u32,
        size: u32,
        buf: &mut [u8],
    ) -> Result<usize, ReadError<S::Error>> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_some(
                shape,
                offset,
                size,
                filled,
                &mut buf[filled..],
            )?;
            if n == 0 {
                break;
            }
            filled = filled.saturating_add(n);
        }
        Ok(filled)
    }

    /// One call into the source at `offset + pos`. The count is clamped
    /// to the buffer length so a misbehaving source cannot move the
    /// cursor past what was asked for. A failure is reported against
    /// the whole request, `size` bytes at `offset`.
    fn read_some(
        &self,
        shape: &'static str,
        offset: u32,
        size: u32,
        pos: usize,
        buf: &mut [u8],
    ) -> Result<usize, ReadError<S::Error>> {
        let at = u64::from(offset).saturating_add(pos as u64);
        match self.source.read_at(at, buf) {
            Ok(n) => Ok(n.min(buf.len())),
            Err(source) => {
                debug!(shape, offset, size, at, "byte source failed");
                Err(ReadError::Io {
                    shape,
                    offset,
                    size,
                    source,
                })
            }
        }
    }

    fn scan_bulk(
        &self,
        offset: u32,
        len: u32,
    ) -> Result<Vec<u8>, ReadError<S::Error>> {
        let mut buf = vec![0; usize_from_u32(len)];
        let filled = self.fill(STRING_SHAPE, offset, len, &mut buf)?;
        buf.truncate(filled);
        if let Some(nul) = buf.iter().position(|&b| b == 0) {
            buf.truncate(nul);
        }
        Ok(buf)
    }

    fn scan_chunked(
        &self,
        offset: u32,
        len: u32,
        chunk_size: u32,
    ) -> Result<Vec<u8>, ReadError<S::Error>> {
        let size = len;
        let len = usize_from_u32(len);
        let mut chunk = vec![0; usize_from_u32(chunk_size).min(len)];
        let mut result = Vec::new();

        while result.len() < len {
            let want = len.saturating_sub(result.len()).min(chunk.len());
            let n = self.read_some(
                STRING_SHAPE,
                offset,
                size,
                result.len(),
                &mut chunk[..want],
            )?;
            // Only an empty read is end-of-data. A short one just means
            // the source had less to give this time.
            if n == 0 {
                break;
            }

            let bytes = &chunk[..n];
            if let Some(nul) = bytes.iter().position(|&b| b == 0) {
                result.extend_from_slice(&bytes[..nul]);
                return Ok(result);
            }
            result.extend_from_slice(bytes);
        }
        Ok(result)
    }
}

/// Decode a record from exactly `size_of::<T>()` bytes.
fn decode<T: Record, E>(
    bytes: &[u8],
    offset: u32,
    size: u32,
) -> Result<T, ReadError<E>> {
    match pod::from_bytes::<T>(bytes) {
        Ok((record, _)) => Ok(*record),
        Err(_) => Err(ReadError::ShortRead {
            shape: T::NAME,
            offset,
            size,
            read: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
        }),
    }
}
