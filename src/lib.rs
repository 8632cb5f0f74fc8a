pub mod cli;
pub mod converter;
pub mod error;
pub mod logging;
pub mod tokenizer;
pub mod translator;
pub mod writer;

pub use cli::Cli;
pub use converter::{translate, CsvToShpConverter};
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use translator::{ConversionSummary, Translator};
pub use writer::{OutputPaths, PointWriter, ShapefileWriter};
