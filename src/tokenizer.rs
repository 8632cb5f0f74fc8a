//! Incremental tokenizer for comma separated text.
//!
//! Bytes are pushed in chunks of any size and every completed field or row
//! is reported to a [`TokenHandler`] before [`Tokenizer::feed`] returns. The
//! tokenizer owns a single field buffer that is reused for every field, so
//! handlers must copy whatever they want to keep.

use thiserror::Error;

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';

/// Receives the events produced by a [`Tokenizer`].
pub trait TokenHandler {
    type Error: From<Malformed>;

    /// Called once per field with its raw bytes, its position in the row and
    /// the ordinal of the row it belongs to.
    fn on_field(&mut self, bytes: &[u8], field: usize, record: u64) -> Result<(), Self::Error>;

    /// Called once all fields of `record` have been delivered.
    fn on_record_end(&mut self, record: u64) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    UnterminatedQuote,
    TextAfterQuote,
    StrayQuote,
}

impl MalformedKind {
    fn describe(&self) -> &'static str {
        match self {
            MalformedKind::UnterminatedQuote => "quoted field is never closed",
            MalformedKind::TextAfterQuote => "unexpected character after closing quote",
            MalformedKind::StrayQuote => "quote inside an unquoted field",
        }
    }
}

/// The input does not follow the delimited text grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed input at byte {offset} (field {field}, record {record}): {}", .kind.describe())]
pub struct Malformed {
    pub kind: MalformedKind,
    pub field: usize,
    pub record: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing of the current row has been seen yet.
    RowStart,
    /// A field has begun but holds no significant byte yet.
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote was seen inside a quoted field: either an escape or the close.
    QuoteInQuoted,
    /// Whitespace after a closing quote.
    AfterQuoted,
}

#[derive(Debug)]
pub struct Tokenizer {
    state: State,
    field: Vec<u8>,
    // Length of `field` without trailing unquoted whitespace.
    keep: usize,
    field_index: usize,
    record_index: u64,
    offset: u64,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Tokenizer {
            state: State::RowStart,
            field: Vec::new(),
            keep: 0,
            field_index: 0,
            record_index: 0,
            offset: 0,
        }
    }

    /// Number of rows completed so far.
    pub fn records(&self) -> u64 {
        self.record_index
    }

    /// Tokenizes `chunk`, calling `handler` for every field and row it completes.
    pub fn feed<H: TokenHandler>(&mut self, chunk: &[u8], handler: &mut H) -> Result<(), H::Error> {
        for &byte in chunk {
            self.step(byte, handler)?;
            self.offset += 1;
        }
        Ok(())
    }

    /// Flushes a final field and row that were not ended by a row terminator.
    pub fn finish<H: TokenHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        match self.state {
            State::RowStart => Ok(()),
            State::Quoted => Err(self.malformed(MalformedKind::UnterminatedQuote).into()),
            State::FieldStart | State::Unquoted | State::QuoteInQuoted | State::AfterQuoted => {
                self.end_field(handler)?;
                self.end_record(handler)
            }
        }
    }

    fn step<H: TokenHandler>(&mut self, byte: u8, handler: &mut H) -> Result<(), H::Error> {
        match self.state {
            State::RowStart => match byte {
                b'\n' | b'\r' => {}
                b' ' | b'\t' => {}
                DELIMITER => {
                    self.end_field(handler)?;
                    self.state = State::FieldStart;
                }
                QUOTE => self.state = State::Quoted,
                _ => self.push(byte),
            },
            State::FieldStart => match byte {
                b'\n' | b'\r' => {
                    self.end_field(handler)?;
                    self.end_record(handler)?;
                }
                b' ' | b'\t' => {}
                DELIMITER => self.end_field(handler)?,
                QUOTE => self.state = State::Quoted,
                _ => self.push(byte),
            },
            State::Unquoted => match byte {
                b'\n' | b'\r' => {
                    self.end_field(handler)?;
                    self.end_record(handler)?;
                }
                DELIMITER => {
                    self.end_field(handler)?;
                    self.state = State::FieldStart;
                }
                QUOTE => return Err(self.malformed(MalformedKind::StrayQuote).into()),
                b' ' | b'\t' => self.field.push(byte),
                _ => self.push(byte),
            },
            State::Quoted => match byte {
                QUOTE => self.state = State::QuoteInQuoted,
                _ => {
                    self.field.push(byte);
                    self.keep = self.field.len();
                }
            },
            State::QuoteInQuoted => match byte {
                QUOTE => {
                    self.field.push(QUOTE);
                    self.keep = self.field.len();
                    self.state = State::Quoted;
                }
                _ => self.after_quoted(byte, handler)?,
            },
            State::AfterQuoted => self.after_quoted(byte, handler)?,
        }
        Ok(())
    }

    fn after_quoted<H: TokenHandler>(&mut self, byte: u8, handler: &mut H) -> Result<(), H::Error> {
        match byte {
            b'\n' | b'\r' => {
                self.end_field(handler)?;
                self.end_record(handler)?;
            }
            DELIMITER => {
                self.end_field(handler)?;
                self.state = State::FieldStart;
            }
            b' ' | b'\t' => self.state = State::AfterQuoted,
            _ => return Err(self.malformed(MalformedKind::TextAfterQuote).into()),
        }
        Ok(())
    }

    fn push(&mut self, byte: u8) {
        self.field.push(byte);
        self.keep = self.field.len();
        self.state = State::Unquoted;
    }

    fn end_field<H: TokenHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        let result = handler.on_field(&self.field[..self.keep], self.field_index, self.record_index);
        self.field.clear();
        self.keep = 0;
        self.field_index += 1;
        result
    }

    fn end_record<H: TokenHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        let result = handler.on_record_end(self.record_index);
        self.field_index = 0;
        self.record_index += 1;
        self.state = State::RowStart;
        result
    }

    fn malformed(&self, kind: MalformedKind) -> Malformed {
        Malformed {
            kind,
            field: self.field_index,
            record: self.record_index,
            offset: self.offset,
        }
    }
}
