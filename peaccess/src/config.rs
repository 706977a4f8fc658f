// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Longest string read when nothing tighter is requested (2 MiB).
pub const DEFAULT_MAX_STRING_LEN: u32 = 2 << 20;

/// Chunk size used by [`StringStrategy::Chunked`] in the default
/// configuration.
pub const DEFAULT_CHUNK_SIZE: u32 = 64;

/// How [`ImageReader::read_string_at`] fetches bytes from the source.
///
/// Both strategies return the same string; they differ only in how
/// many bytes past the terminator are read.
///
/// [`ImageReader::read_string_at`]: crate::ImageReader::read_string_at
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StringStrategy {
    /// Read the whole capped range, then search it for the terminator.
    Bulk,

    /// Read `chunk_size` bytes at a time and stop at the terminator. A
    /// `chunk_size` of zero is treated as one.
    Chunked {
        /// Bytes requested per read.
        chunk_size: u32,
    },
}

/// Settings for an [`ImageReader`].
///
/// [`ImageReader`]: crate::ImageReader
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReaderConfig {
    /// Upper bound on the length of any string read, whatever length the
    /// caller or resolver asks for.
    pub max_string_len: u32,

    /// How strings are read from the source.
    pub string_strategy: StringStrategy,
}

impl ReaderConfig {
    /// Set [`ReaderConfig::max_string_len`].
    #[must_use]
    pub fn with_max_string_len(mut self, max_string_len: u32) -> Self {
        self.max_string_len = max_string_len;
        self
    }

    /// Set [`ReaderConfig::string_strategy`].
    #[must_use]
    pub fn with_string_strategy(mut self, string_strategy: StringStrategy) -> Self {
        self.string_strategy = string_strategy;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_string_len: DEFAULT_MAX_STRING_LEN,
            string_strategy: StringStrategy::Chunked {
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
        }
    }
}
