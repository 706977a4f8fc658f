// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use object::pe::{ImageExportDirectory, IMAGE_DIRECTORY_ENTRY_EXPORT};
use object::LittleEndian;
use peaccess::{
    section_name, ImageReader, PeHeaders, ReaderConfig, StringStrategy,
    DEFAULT_CHUNK_SIZE,
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Number of bytes fetched per read when scanning strings.
    #[arg(long, global = true, value_parser = parse_u32)]
    chunk_size: Option<u32>,

    /// Fetch each string in a single read instead of in chunks.
    #[arg(long, global = true, conflicts_with = "chunk_size")]
    bulk: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Location {
    /// File offset of the string.
    #[arg(long, value_parser = parse_u32)]
    offset: Option<u32>,

    /// Relative virtual address of the string.
    #[arg(long, value_parser = parse_u32)]
    rva: Option<u32>,
}

#[derive(Args)]
struct StringAction {
    pe_path: PathBuf,

    #[command(flatten)]
    location: Location,

    /// Longest string to return, before the reader's own cap.
    #[arg(long, value_parser = parse_u32)]
    max_len: Option<u32>,
}

#[derive(Subcommand)]
enum Action {
    /// Print headers, sections and the export name.
    Info { pe_path: PathBuf },
    /// Print the NUL-terminated string at an offset or RVA.
    String(StringAction),
}

/// Parse a decimal or `0x`-prefixed hexadecimal number.
fn parse_u32(s: &str) -> Result<u32> {
    let parsed = if let Some(hex) =
        s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.with_context(|| format!("invalid number: {s:?}"))
}

fn reader_config(chunk_size: Option<u32>, bulk: bool) -> ReaderConfig {
    let strategy = if bulk {
        StringStrategy::Bulk
    } else {
        StringStrategy::Chunked {
            chunk_size: chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        }
    };
    ReaderConfig::default().with_string_strategy(strategy)
}

/// Open a PE file and get its length as the reader's data length.
fn open_image(pe_path: &Path) -> Result<(File, u32)> {
    let file = fs_err::File::open(pe_path)?;
    let len = file.metadata()?.len();
    let len = u32::try_from(len).map_err(|_| {
        anyhow!("{} is too large: {len} bytes", pe_path.display())
    })?;
    debug!(path = %pe_path.display(), len, "opened image");
    Ok((file.into_parts().0, len))
}

fn action_info(pe_path: &Path, config: ReaderConfig) -> Result<()> {
    let (file, len) = open_image(pe_path)?;
    let reader = ImageReader::with_config(&file, len, config);
    let headers = PeHeaders::parse(&reader)?;
    let optional = headers.optional_header();

    println!("File length: {len:#x}");
    println!(
        "Machine:     {:#06x}",
        headers.file_header().machine.get(LittleEndian)
    );
    println!(
        "Format:      {}",
        if optional.is_64() { "PE32+" } else { "PE32" }
    );
    println!("Image base:  {:#x}", optional.image_base());
    println!("Entry point: {:#x}", optional.address_of_entry_point());

    println!("Sections:");
    for section in headers.sections().iter() {
        println!(
            "  {:<8} va {:#010x} vsize {:#010x} raw {:#010x} rawsize {:#010x}",
            section_name(section).escape_ascii().to_string(),
            section.virtual_address.get(LittleEndian),
            section.virtual_size.get(LittleEndian),
            section.pointer_to_raw_data.get(LittleEndian),
            section.size_of_raw_data.get(LittleEndian),
        );
    }

    let export_rva = headers
        .data_directory(IMAGE_DIRECTORY_ENTRY_EXPORT)
        .map(|dir| dir.virtual_address.get(LittleEndian))
        .unwrap_or(0);
    if export_rva == 0 {
        println!("No exports");
        return Ok(());
    }
    let export = reader
        .read_record_at_rva::<ImageExportDirectory, _>(
            headers.sections(),
            export_rva,
        )
        .context("failed to read export directory")?;
    let name = reader
        .read_string_at_rva(headers.sections(), export.name.get(LittleEndian))
        .context("failed to read export name")?;
    println!("Export name: {}", name.escape_ascii());

    Ok(())
}

fn action_string(action: &StringAction, config: ReaderConfig) -> Result<()> {
    let (file, len) = open_image(&action.pe_path)?;
    let reader = ImageReader::with_config(&file, len, config);

    let string = match (action.location.offset, action.location.rva) {
        (Some(offset), None) => reader
            .read_string_at(offset, action.max_len.unwrap_or(u32::MAX))?,
        (None, Some(rva)) => {
            let headers = PeHeaders::parse(&reader)?;
            reader.read_string_at_rva_with_max(
                headers.sections(),
                rva,
                action.max_len.unwrap_or(u32::MAX),
            )?
        }
        _ => bail!("exactly one of --offset and --rva is required"),
    };
    info!(len = string.len(), "read string");

    println!("{}", string.escape_ascii());
    Ok(())
}

fn run_action(action: &Action, config: ReaderConfig) -> Result<()> {
    match action {
        Action::Info { pe_path } => action_info(pe_path, config),
        Action::String(action) => action_string(action, config),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    run_action(&cli.action, reader_config(cli.chunk_size, cli.bulk))
}
