use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::converter::CsvToShpConverter;
use crate::error::Result;

/// Convert a comma separated table of points into an ESRI shapefile.
///
/// The first row names the columns. In every following row field 0 is the
/// X coordinate and field 1 the Y coordinate; all fields are also kept as
/// string attributes.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Input table
    pub input: PathBuf,

    /// Base path for the .shp, .shx and .dbf files [default: input path without its extension]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bytes read from the input per pass
    #[arg(long, default_value = "8192")]
    pub chunk_size: NonZeroUsize,
}

impl Cli {
    pub fn output_base(&self) -> PathBuf {
        match &self.output {
            Some(base) => base.clone(),
            None => strip_extension(&self.input),
        }
    }

    pub fn to_converter(&self) -> Result<CsvToShpConverter> {
        let converter = CsvToShpConverter::new(&self.input, &self.output_base())?;
        Ok(converter.with_chunk_size(self.chunk_size.get()))
    }
}

/// Drops the last extension of the file name, if it has one.
///
/// Only the final path component is looked at: a dot in a directory name,
/// or the leading dot of a name like `.hidden`, is never treated as the
/// start of an extension.
pub fn strip_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}
