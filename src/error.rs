use std::io;
use std::num::ParseFloatError;
use std::path::PathBuf;

use thiserror::Error;

use crate::tokenizer::Malformed;
use crate::writer::WriteError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    MalformedInput(#[from] Malformed),
    #[error("field {field}, record {record}: {value:?} is not a valid coordinate")]
    CoordinateParse {
        field: usize,
        record: u64,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("record {record}: at least X and Y coordinates required, found {fields} field(s)")]
    IncompleteRecord { record: u64, fields: usize },
    #[error("field {field}, record 0: could not declare column: {source}")]
    SchemaWrite {
        field: usize,
        #[source]
        source: WriteError,
    },
    #[error("field {field}, record {record}: could not write attribute: {source}")]
    AttributeWrite {
        field: usize,
        record: u64,
        #[source]
        source: WriteError,
    },
    #[error("record {record}: could not write point: {source}")]
    GeometryWrite {
        record: u64,
        #[source]
        source: WriteError,
    },
    #[error("could not finalize output: {0}")]
    Finalize(#[source] WriteError),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io { .. } | Error::Read(_) => "io",
            Error::MalformedInput(_) => "malformed_input",
            Error::CoordinateParse { .. } => "coordinate_parse",
            Error::IncompleteRecord { .. } => "incomplete_record",
            Error::SchemaWrite { .. } => "schema_write",
            Error::AttributeWrite { .. } => "attribute_write",
            Error::GeometryWrite { .. } => "geometry_write",
            Error::Finalize(_) => "finalize",
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
