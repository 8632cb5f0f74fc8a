use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use crate::translator::{ConversionSummary, Translator};
use crate::writer::{OutputPaths, PointWriter, ShapefileWriter};

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Streams `input` through the tokenizer into `writer`, `chunk_size` bytes at a time.
///
/// The writer is handed back unfinished so the caller decides how to close it.
pub fn translate<R: Read, W: PointWriter>(
    mut input: R,
    writer: W,
    chunk_size: usize,
) -> Result<(W, ConversionSummary)> {
    let mut tokenizer = Tokenizer::new();
    let mut translator = Translator::new(writer);
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let read = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Read(err)),
        };
        tokenizer.feed(&buf[..read], &mut translator)?;
    }
    tokenizer.finish(&mut translator)?;
    debug!(rows = tokenizer.records(), "input exhausted");

    Ok(translator.into_parts())
}

pub struct CsvToShpConverter {
    input_path: PathBuf,
    input: File,
    outputs: OutputPaths,
    writer: ShapefileWriter,
    chunk_size: usize,
}

impl CsvToShpConverter {
    pub fn new(input_path: &Path, output_base: &Path) -> Result<CsvToShpConverter> {
        let input = File::open(input_path).map_err(|err| Error::io("open", input_path, err))?;
        let outputs = OutputPaths::from_base(output_base);
        let writer = ShapefileWriter::create(&outputs).inspect_err(|_| {
            if let Err(remove_err) = outputs.remove() {
                warn!("could not remove partial output: {remove_err}");
            }
        })?;

        Ok(CsvToShpConverter {
            input_path: input_path.to_path_buf(),
            input,
            outputs,
            writer,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn outputs(&self) -> &OutputPaths {
        &self.outputs
    }

    /// Runs the conversion. On failure every output file is removed.
    pub fn convert(self) -> Result<ConversionSummary> {
        let CsvToShpConverter {
            input_path,
            input,
            outputs,
            writer,
            chunk_size,
        } = self;

        info!(
            input = %input_path.display(),
            shp = %outputs.shp.display(),
            dbf = %outputs.dbf.display(),
            "converting"
        );

        let result = translate(input, writer, chunk_size).and_then(|(writer, summary)| {
            writer.finish().map_err(Error::Finalize)?;
            Ok(summary)
        });

        match result {
            Ok(summary) => {
                info!(
                    fields = summary.fields,
                    records = summary.records,
                    "wrote {}",
                    outputs.shp.display()
                );
                Ok(summary)
            }
            Err(err) => {
                // The writer has been dropped by now, so the files are closed.
                warn!(kind = err.kind(), "conversion failed, discarding outputs");
                if let Err(remove_err) = outputs.remove() {
                    warn!("could not remove partial output: {remove_err}");
                }
                Err(err)
            }
        }
    }
}
