//! Turns tokenizer events into schema, attribute and point writes.
//!
//! Record 0 is the header: each of its fields declares a string column.
//! Every later record becomes one point, taking X from field 0 and Y from
//! field 1, with all of its fields stored as attributes.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::tokenizer::TokenHandler;
use crate::writer::PointWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    AwaitingHeaderField,
    AwaitingDataField,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Columns declared by the header row.
    pub fields: usize,
    /// Points written, one per data row.
    pub records: u64,
}

pub struct Translator<W> {
    writer: W,
    state: RowState,
    field: usize,
    record: u64,
    x: f64,
    y: f64,
    summary: ConversionSummary,
}

impl<W: PointWriter> Translator<W> {
    pub fn new(writer: W) -> Self {
        Translator {
            writer,
            state: RowState::AwaitingHeaderField,
            field: 0,
            record: 0,
            x: 0.0,
            y: 0.0,
            summary: ConversionSummary::default(),
        }
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn summary(&self) -> ConversionSummary {
        self.summary
    }

    /// Hands back the writer once the stream is exhausted.
    pub fn into_parts(self) -> (W, ConversionSummary) {
        (self.writer, self.summary)
    }

    fn parse_coordinate(&self, value: &str) -> Result<f64> {
        value.parse::<f64>().map_err(|source| Error::CoordinateParse {
            field: self.field,
            record: self.record,
            value: value.to_string(),
            source,
        })
    }
}

impl<W: PointWriter> TokenHandler for Translator<W> {
    type Error = Error;

    fn on_field(&mut self, bytes: &[u8], field: usize, record: u64) -> Result<()> {
        debug_assert_eq!(field, self.field, "field cursor out of step with tokenizer");
        debug_assert_eq!(record, self.record, "record cursor out of step with tokenizer");

        let value = String::from_utf8_lossy(bytes).into_owned();

        match self.state {
            RowState::AwaitingHeaderField => {
                self.writer
                    .add_field(&value)
                    .map_err(|source| Error::SchemaWrite {
                        field: self.field,
                        source,
                    })?;
                self.summary.fields += 1;
            }
            RowState::AwaitingDataField => {
                match self.field {
                    0 => self.x = self.parse_coordinate(&value)?,
                    1 => self.y = self.parse_coordinate(&value)?,
                    _ => {}
                }
                self.writer
                    .write_attribute(self.record - 1, self.field, value)
                    .map_err(|source| Error::AttributeWrite {
                        field: self.field,
                        record: self.record,
                        source,
                    })?;
            }
        }

        self.field += 1;
        Ok(())
    }

    fn on_record_end(&mut self, record: u64) -> Result<()> {
        debug_assert_eq!(record, self.record, "record cursor out of step with tokenizer");

        match self.state {
            RowState::AwaitingHeaderField => {
                debug!(fields = self.field, "header row declared");
                self.state = RowState::AwaitingDataField;
            }
            RowState::AwaitingDataField => {
                if self.field < 2 {
                    return Err(Error::IncompleteRecord {
                        record: self.record,
                        fields: self.field,
                    });
                }
                trace!(record = self.record, x = self.x, y = self.y, "writing point");
                self.writer
                    .write_point(geo_types::Point::new(self.x, self.y))
                    .map_err(|source| Error::GeometryWrite {
                        record: self.record,
                        source,
                    })?;
                self.summary.records += 1;
            }
        }

        self.field = 0;
        self.record += 1;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use crate::writer::WriteError;

    /// Keeps everything written to it in memory.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryWriter {
        pub fields: Vec<String>,
        pub rows: Vec<Vec<String>>,
        pub points: Vec<(f64, f64)>,
    }

    impl PointWriter for MemoryWriter {
        fn add_field(&mut self, name: &str) -> Result<(), WriteError> {
            if self.fields.iter().any(|field| field == name) {
                return Err(WriteError::DuplicateField(name.to_string()));
            }
            self.fields.push(name.to_string());
            Ok(())
        }

        fn write_attribute(&mut self, row: u64, field: usize, value: String) -> Result<(), WriteError> {
            if field >= self.fields.len() {
                return Err(WriteError::FieldOutOfRange {
                    field,
                    columns: self.fields.len(),
                });
            }
            let row = row as usize;
            if self.rows.len() <= row {
                self.rows.resize(row + 1, vec![]);
            }
            let values = &mut self.rows[row];
            if values.len() <= field {
                values.resize(field + 1, String::new());
            }
            values[field] = value;
            Ok(())
        }

        fn write_point(&mut self, point: geo_types::Point<f64>) -> Result<(), WriteError> {
            self.points.push((point.x(), point.y()));
            Ok(())
        }

        fn finish(self) -> Result<(), WriteError> {
            Ok(())
        }
    }

    fn run(input: &str) -> Result<(MemoryWriter, ConversionSummary)> {
        let mut tokenizer = Tokenizer::new();
        let mut translator = Translator::new(MemoryWriter::default());
        tokenizer.feed(input.as_bytes(), &mut translator)?;
        tokenizer.finish(&mut translator)?;
        Ok(translator.into_parts())
    }

    #[test]
    fn header_declares_columns_and_rows_become_points() {
        let (writer, summary) = run("x,y,label\n1.5,2.5,label\n-3,4e1,other\n").unwrap();

        assert_eq!(writer.fields, vec!["x", "y", "label"]);
        assert_eq!(writer.points, vec![(1.5, 2.5), (-3.0, 40.0)]);
        assert_eq!(
            writer.rows,
            vec![vec!["1.5", "2.5", "label"], vec!["-3", "4e1", "other"]]
        );
        assert_eq!(summary, ConversionSummary { fields: 3, records: 2 });
    }

    #[test]
    fn header_only_input_writes_no_rows() {
        let (writer, summary) = run("x,y,name\n").unwrap();

        assert_eq!(writer.fields.len(), 3);
        assert!(writer.rows.is_empty());
        assert!(writer.points.is_empty());
        assert_eq!(summary.records, 0);
    }

    #[test]
    fn row_with_exactly_two_fields_is_accepted() {
        let (writer, _) = run("x,y\n10,20").unwrap();
        assert_eq!(writer.points, vec![(10.0, 20.0)]);
    }

    #[test]
    fn row_with_one_field_is_incomplete() {
        let err = run("x,y\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, Error::IncompleteRecord { record: 2, fields: 1 }));
        assert_eq!(err.kind(), "incomplete_record");
    }

    #[test]
    fn exponent_notation_is_a_valid_coordinate() {
        let (writer, _) = run("x,y\n1.0e3,0\n").unwrap();
        assert_eq!(writer.points, vec![(1000.0, 0.0)]);
    }

    #[test]
    fn non_numeric_coordinate_fails() {
        let err = run("x,y\nabc,1\n").unwrap_err();
        match err {
            Error::CoordinateParse { field, record, value, .. } => {
                assert_eq!((field, record), (0, 1));
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trailing_garbage_in_coordinate_fails() {
        let err = run("x,y\n1,2.5m\n").unwrap_err();
        assert!(matches!(err, Error::CoordinateParse { field: 1, record: 1, .. }));
        assert!(err.to_string().starts_with("field 1, record 1"));
    }

    #[test]
    fn later_fields_are_not_parsed() {
        let (writer, _) = run("x,y,z\n1,2,not a number\n").unwrap();
        assert_eq!(writer.rows[0][2], "not a number");
    }

    #[test]
    fn duplicate_header_is_a_schema_error() {
        let err = run("x,y,x\n").unwrap_err();
        assert!(matches!(err, Error::SchemaWrite { field: 2, .. }));
    }

    #[test]
    fn extra_data_field_is_an_attribute_error() {
        let err = run("x,y\n1,2,3\n").unwrap_err();
        assert!(matches!(err, Error::AttributeWrite { field: 2, record: 1, .. }));
    }

    #[test]
    fn malformed_input_propagates() {
        let err = run("x,y\n1,\"2\n").unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }

    #[test]
    fn switches_to_data_after_header() {
        let mut tokenizer = Tokenizer::new();
        let mut translator = Translator::new(MemoryWriter::default());
        tokenizer.feed(b"x,y", &mut translator).unwrap();
        assert_eq!(translator.state(), RowState::AwaitingHeaderField);
        tokenizer.feed(b"\n", &mut translator).unwrap();
        assert_eq!(translator.state(), RowState::AwaitingDataField);
        assert_eq!(translator.summary().fields, 2);
    }
}
