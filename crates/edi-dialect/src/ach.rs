//! NACHA ACH tokenizer
//!
//! ACH files are 94-character records with no delimiters. The record type
//! is the first character; fields are cut by width as the parser asks for
//! them. Blocking filler records (all `9`) are skipped.

use crate::decode::{Charset, Decoded};
use crate::delimiters::Delimiters;
use crate::pushback::PushbackReader;
use crate::token::FieldToken;
use crate::tokenizer::Tokenizer;
use crate::Dialect;
use edi_ir::{DocumentError, DocumentErrors, ErrorCode, Offender, Severity};
use std::io::{Cursor, Read};
use tracing::{trace, warn};

/// Record length in characters
pub const RECORD_LENGTH: usize = 94;

#[derive(Debug)]
struct Record {
    id: FieldToken,
    text: Vec<char>,
    offset: usize,
    length: usize,
}

/// Tokenizer for fixed-width ACH files
#[derive(Debug)]
pub struct AchTokenizer<R = Cursor<Vec<u8>>> {
    reader: PushbackReader<R>,
    current: Option<Record>,
    cursor: usize,
    ordinal: usize,
    errors: DocumentErrors,
}

impl AchTokenizer<Cursor<Vec<u8>>> {
    pub fn from_bytes(input: Vec<u8>) -> Self {
        Self::new(Cursor::new(input))
    }
}

impl<R: Read> AchTokenizer<R> {
    /// Wrap a reader and prime the first record
    pub fn new(reader: R) -> Self {
        let mut tokenizer = Self {
            reader: PushbackReader::new(reader),
            current: None,
            cursor: 0,
            ordinal: 0,
            errors: DocumentErrors::new(),
        };
        tokenizer.advance();
        tokenizer
    }

    /// Record a problem with the record at `ordinal`
    fn push_error(
        &mut self,
        ordinal: usize,
        code: ErrorCode,
        severity: Severity,
        id: &str,
        message: String,
        offset: usize,
    ) {
        self.errors.push(
            DocumentError::new(severity, code, id, message)
                .at(ordinal)
                .offender(Offender::Token { offset }),
        );
    }

    fn advance(&mut self) -> bool {
        self.cursor = 0;
        match self.read_record() {
            Ok(record) => {
                if record.is_some() {
                    self.ordinal += 1;
                }
                self.current = record;
            }
            Err(e) => {
                let offset = self.reader.position();
                self.push_error(
                    self.ordinal + 1,
                    ErrorCode::TrailingData,
                    Severity::Structural,
                    "",
                    format!("Read failed: {e}"),
                    offset,
                );
                self.current = None;
            }
        }
        self.current.is_some()
    }

    fn read_record(&mut self) -> std::io::Result<Option<Record>> {
        loop {
            // Probe the record type, then push it back so the record is read whole
            let first = loop {
                match self.reader.read_byte()? {
                    Some(b'\r' | b'\n') => {}
                    other => break other,
                }
            };
            let Some(first) = first else {
                return Ok(None);
            };
            self.reader.unread(&[first]);

            let offset = self.reader.position();
            let mut bytes = self.reader.read_up_to(RECORD_LENGTH)?;
            if let Some(cut) = bytes.iter().position(|b| *b == b'\r' || *b == b'\n') {
                let rest = bytes.split_off(cut);
                self.reader.unread(&rest);
            }
            let decoded = Decoded::new(&bytes, Charset::Utf8, false);
            let text: Vec<char> = decoded.text().chars().collect();

            if text.len() == RECORD_LENGTH && text.iter().all(|c| *c == '9') {
                trace!(offset, "Skipping ACH filler record");
                continue;
            }
            let id = char::from(first).to_string();
            let ordinal = self.ordinal + 1;
            for (at, byte) in decoded.invalid() {
                self.push_error(
                    ordinal,
                    ErrorCode::InvalidCharacter,
                    Severity::Requirement,
                    &id,
                    format!("Byte 0x{byte:02X} at offset {} is not valid UTF-8", offset + at),
                    offset + at,
                );
            }
            if text.len() != RECORD_LENGTH {
                warn!(offset, length = text.len(), "Short ACH record");
                self.push_error(
                    ordinal,
                    ErrorCode::TrailingData,
                    Severity::Integrity,
                    &id,
                    format!(
                        "Record has {} characters, expected {RECORD_LENGTH}",
                        text.len()
                    ),
                    offset,
                );
            }
            return Ok(Some(Record {
                id: FieldToken::simple(id),
                length: bytes.len(),
                text,
                offset,
            }));
        }
    }
}

impl<R: Read> Tokenizer for AchTokenizer<R> {
    fn dialect(&self) -> Dialect {
        Dialect::Ach
    }

    fn delimiters(&self) -> Option<&Delimiters> {
        None
    }

    fn current_segment_id(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.id.value())
    }

    fn next_data_element(&mut self) -> Option<FieldToken> {
        None
    }

    /// Only the record type (position 1) is known without field widths
    fn data_element_at(&self, n: usize) -> Option<&FieldToken> {
        match n {
            1 => self.current.as_ref().map(|r| &r.id),
            _ => None,
        }
    }

    fn field_count(&self) -> usize {
        usize::from(self.current.is_some())
    }

    fn reset_segment(&mut self) {
        self.cursor = 0;
    }

    fn next_segment(&mut self) -> bool {
        self.advance()
    }

    fn input_byte_count(&self) -> usize {
        self.current
            .as_ref()
            .map_or_else(|| self.reader.position(), |r| r.offset)
    }

    fn segment_ordinal(&self) -> usize {
        self.ordinal
    }

    fn segment_length(&self) -> usize {
        self.current.as_ref().map_or(0, |r| r.length)
    }

    fn report_error(&mut self, code: ErrorCode, severity: Severity, message: &str) {
        let id = self
            .current_segment_id()
            .unwrap_or_default()
            .to_string();
        let offset = self.input_byte_count();
        self.push_error(self.ordinal, code, severity, &id, message.to_string(), offset);
    }

    fn take_errors(&mut self) -> DocumentErrors {
        std::mem::take(&mut self.errors)
    }

    fn next_fixed_field(&mut self, width: usize) -> Option<String> {
        let record = self.current.as_ref()?;
        if self.cursor >= record.text.len() {
            return None;
        }
        let end = (self.cursor + width).min(record.text.len());
        let field: String = record.text[self.cursor..end].iter().collect();
        self.cursor = end;
        Some(field)
    }

    fn is_fixed_width(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: char, body: &str) -> String {
        let mut line = format!("{kind}{body}");
        while line.len() < RECORD_LENGTH {
            line.push(' ');
        }
        line
    }

    #[test]
    fn test_records_and_fixed_fields() {
        let input = format!(
            "{}\n{}\n",
            record('1', "01 123456789"),
            record('5', "200ACME")
        );
        let mut t = AchTokenizer::from_bytes(input.into_bytes());
        assert!(t.is_fixed_width());
        assert_eq!(t.current_segment_id(), Some("1"));
        assert_eq!(t.next_fixed_field(1).as_deref(), Some("1"));
        assert_eq!(t.next_fixed_field(2).as_deref(), Some("01"));
        assert_eq!(t.next_fixed_field(10).as_deref(), Some(" 123456789"));
        t.reset_segment();
        assert_eq!(t.next_fixed_field(3).as_deref(), Some("101"));

        assert!(t.next_segment());
        assert_eq!(t.current_segment_id(), Some("5"));
        assert_eq!(t.input_byte_count(), RECORD_LENGTH + 1);
        assert_eq!(t.data_element_at(1).unwrap().value(), "5");
        assert!(!t.next_segment());
        assert!(t.is_exhausted());
    }

    #[test]
    fn test_filler_records_are_skipped() {
        let filler = "9".repeat(RECORD_LENGTH);
        let input = format!("{}{}{}", record('9', "000001"), filler, filler);
        let mut t = AchTokenizer::from_bytes(input.into_bytes());
        assert_eq!(t.current_segment_id(), Some("9"));
        assert!(!t.next_segment());
        assert!(t.take_errors().is_empty());
    }

    #[test]
    fn test_short_record_is_reported() {
        let mut t = AchTokenizer::from_bytes(b"101 short\n".to_vec());
        assert_eq!(t.current_segment_id(), Some("1"));
        let errors = t.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::TrailingData);
        assert_eq!(errors.as_slice()[0].position, 1);
    }

    #[test]
    fn test_undecodable_byte_is_reported() {
        let mut bytes = record('6', "22091000019").into_bytes();
        bytes[40] = 0xC9;
        bytes.push(b'\n');
        let mut t = AchTokenizer::from_bytes(bytes);
        let errors = t.take_errors();
        let invalid: Vec<_> = errors.with_code(ErrorCode::InvalidCharacter).collect();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].offender, Some(Offender::Token { offset: 40 }));
        assert_eq!(invalid[0].id, "6");
    }
}
