//! Delimiter-driven segment scanner shared by X12, EDIFACT and TRADACOMS

use crate::decode::Decoded;
use crate::delimiters::Delimiters;
use crate::token::FieldToken;
use edi_ir::{DocumentError, DocumentErrors, ErrorCode, Offender, Severity};
use tracing::trace;

/// One segment; `offset` and `length` are in input bytes
#[derive(Debug, Clone)]
struct Scanned {
    id: String,
    fields: Vec<FieldToken>,
    offset: usize,
    length: usize,
}

/// Splits text into segments and fields with release-character handling
#[derive(Debug)]
pub struct Scanner {
    source: Decoded,
    delimiters: Delimiters,
    /// Segment ids whose fields are not split on component/repeat
    raw_ids: &'static [&'static str],
    pos: usize,
    current: Option<Scanned>,
    cursor: usize,
    ordinal: usize,
    /// Undecodable bytes already reported
    invalid_reported: usize,
    errors: DocumentErrors,
}

impl Scanner {
    /// Scanner over `input` starting at byte `start`, primed on the first segment
    pub fn new(
        input: String,
        start: usize,
        delimiters: Delimiters,
        raw_ids: &'static [&'static str],
    ) -> Self {
        Self::from_decoded(Decoded::from(input), start, delimiters, raw_ids)
    }

    /// Scanner over decoded input; `start` is an offset into the decoded text
    pub fn from_decoded(
        source: Decoded,
        start: usize,
        delimiters: Delimiters,
        raw_ids: &'static [&'static str],
    ) -> Self {
        let mut scanner = Self {
            source,
            delimiters,
            raw_ids,
            pos: start,
            current: None,
            cursor: 0,
            ordinal: 0,
            invalid_reported: 0,
            errors: DocumentErrors::new(),
        };
        scanner.advance();
        scanner
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn current_segment_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.id.as_str())
    }

    pub fn next_data_element(&mut self) -> Option<FieldToken> {
        let field = self.current.as_ref()?.fields.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(field)
    }

    pub fn data_element_at(&self, n: usize) -> Option<&FieldToken> {
        self.current.as_ref()?.fields.get(n.checked_sub(1)?)
    }

    pub fn field_count(&self) -> usize {
        self.current.as_ref().map_or(0, |s| s.fields.len())
    }

    pub fn reset_segment(&mut self) {
        self.cursor = 0;
    }

    pub fn offset(&self) -> usize {
        self.current
            .as_ref()
            .map_or_else(|| self.source.input_offset(self.source.text().len()), |s| s.offset)
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn length(&self) -> usize {
        self.current.as_ref().map_or(0, |s| s.length)
    }

    pub fn report_error(&mut self, code: ErrorCode, severity: Severity, message: &str) {
        let id = self.current_segment_id().unwrap_or_default().to_string();
        let offset = self.offset();
        self.errors.push(
            DocumentError::new(severity, code, id, message)
                .at(self.ordinal)
                .offender(Offender::Token { offset }),
        );
    }

    pub fn take_errors(&mut self) -> DocumentErrors {
        std::mem::take(&mut self.errors)
    }

    /// Record every undecodable byte before input offset `end`
    fn report_invalid_bytes(&mut self, id: &str, end: usize) {
        let pending = &self.source.invalid()[self.invalid_reported..];
        let count = pending.iter().take_while(|(offset, _)| *offset < end).count();
        for (offset, byte) in &pending[..count] {
            self.errors.push(
                DocumentError::new(
                    Severity::Requirement,
                    ErrorCode::InvalidCharacter,
                    id,
                    format!("Byte 0x{byte:02X} at offset {offset} is not valid UTF-8"),
                )
                .at(self.ordinal + 1)
                .offender(Offender::Token { offset: *offset }),
            );
        }
        self.invalid_reported += count;
    }

    /// Load the next segment; false once input is exhausted
    pub fn advance(&mut self) -> bool {
        self.cursor = 0;
        loop {
            match self.scan() {
                Some(segment) if segment.id.is_empty() => {
                    let offset = segment.offset;
                    self.errors.push(
                        DocumentError::new(
                            Severity::Structural,
                            ErrorCode::UnrecognizedSegment,
                            "",
                            "Empty segment skipped",
                        )
                        .at(self.ordinal + 1)
                        .offender(Offender::Token { offset }),
                    );
                }
                Some(segment) => {
                    self.ordinal += 1;
                    trace!(id = %segment.id, offset = segment.offset, fields = segment.fields.len(), "Scanned segment");
                    self.current = Some(segment);
                    return true;
                }
                None => {
                    self.current = None;
                    return false;
                }
            }
        }
    }

    fn skip_padding(&mut self) {
        let d = self.delimiters;
        let rest = &self.source.text()[self.pos..];
        let skipped: usize = rest
            .chars()
            .take_while(|c| c.is_whitespace() && *c != d.field && *c != d.segment)
            .map(char::len_utf8)
            .sum();
        self.pos += skipped;
    }

    fn scan(&mut self) -> Option<Scanned> {
        self.skip_padding();
        if self.pos >= self.source.text().len() {
            return None;
        }
        let d = self.delimiters;
        let start = self.pos;
        let mut id: Option<String> = None;
        let mut raw = false;
        let mut fields: Vec<FieldToken> = Vec::new();
        let mut repeats: Vec<Vec<String>> = Vec::new();
        let mut components: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut released = false;
        let mut terminated = false;
        let mut consumed = 0;

        for c in self.source.text()[self.pos..].chars() {
            consumed += c.len_utf8();
            if released {
                text.push(c);
                released = false;
                continue;
            }
            if Some(c) == d.release {
                released = true;
                continue;
            }
            if c == d.segment {
                terminated = true;
                break;
            }
            match &id {
                None => {
                    if c == d.field || Some(c) == d.tag {
                        let tag = std::mem::take(&mut text);
                        raw = self.raw_ids.contains(&tag.as_str());
                        id = Some(tag);
                    } else {
                        text.push(c);
                    }
                }
                Some(_) => {
                    if c == d.field {
                        components.push(std::mem::take(&mut text));
                        repeats.push(std::mem::take(&mut components));
                        fields.push(FieldToken {
                            repeats: std::mem::take(&mut repeats),
                        });
                    } else if raw {
                        text.push(c);
                    } else if Some(c) == d.repeat {
                        components.push(std::mem::take(&mut text));
                        repeats.push(std::mem::take(&mut components));
                    } else if c == d.component {
                        components.push(std::mem::take(&mut text));
                    } else {
                        text.push(c);
                    }
                }
            }
        }
        self.pos += consumed;

        let id = match id {
            Some(id) => {
                components.push(text);
                repeats.push(components);
                fields.push(FieldToken { repeats });
                id
            }
            None => text,
        };
        let text_length = if terminated {
            consumed - d.segment.len_utf8()
        } else {
            consumed
        };
        let offset = self.source.input_offset(start);
        let length = self.source.input_offset(start + text_length) - offset;
        let end = self.source.input_offset(self.pos);
        self.report_invalid_bytes(id.trim(), end);

        if !terminated {
            self.errors.push(
                DocumentError::new(
                    Severity::Integrity,
                    ErrorCode::TrailingData,
                    id.clone(),
                    format!("Segment {id} is not terminated"),
                )
                .at(self.ordinal + 1)
                .offender(Offender::Token { offset }),
            );
        }

        Some(Scanned {
            id: id.trim().to_string(),
            fields,
            offset,
            length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Charset;

    fn scanner(input: &str) -> Scanner {
        Scanner::new(input.to_string(), 0, Delimiters::edifact(), &[])
    }

    #[test]
    fn test_fields_and_components() {
        let mut s = scanner("NAD+BY+5412345000013::9'");
        assert_eq!(s.current_segment_id(), Some("NAD"));
        assert_eq!(s.field_count(), 2);
        let second = s.data_element_at(2).unwrap();
        assert_eq!(second.repeats[0], vec!["5412345000013", "", "9"]);
        assert_eq!(s.next_data_element().unwrap().value(), "BY");
        s.reset_segment();
        assert_eq!(s.next_data_element().unwrap().value(), "BY");
        assert!(!s.advance());
        assert!(s.current_segment_id().is_none());
    }

    #[test]
    fn test_release_character_handling() {
        // '?' makes the following delimiter literal
        let s = scanner("FTX+AAI+++It?'s 50?+ off?:'");
        assert_eq!(s.data_element_at(4).unwrap().value(), "It's 50+ off:");
    }

    #[test]
    fn test_double_release_character() {
        let s = scanner("FTX+AAI+++a??b'");
        assert_eq!(s.data_element_at(4).unwrap().value(), "a?b");
    }

    #[test]
    fn test_segment_without_fields() {
        let mut s = scanner("UNS'UNT+2+1'");
        assert_eq!(s.current_segment_id(), Some("UNS"));
        assert_eq!(s.field_count(), 0);
        assert!(s.advance());
        assert_eq!(s.current_segment_id(), Some("UNT"));
        assert_eq!(s.offset(), 4);
        assert_eq!(s.ordinal(), 2);
        assert_eq!(s.length(), 7);
    }

    #[test]
    fn test_whitespace_between_segments_is_skipped() {
        let mut s = scanner("BGM+220'\r\nDTM+137'\n");
        assert!(s.advance());
        assert_eq!(s.current_segment_id(), Some("DTM"));
        assert_eq!(s.offset(), 10);
        assert!(!s.advance());
    }

    #[test]
    fn test_unterminated_segment_is_reported() {
        let mut s = scanner("BGM+220");
        assert_eq!(s.current_segment_id(), Some("BGM"));
        let errors = s.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].code, ErrorCode::TrailingData);
    }

    #[test]
    fn test_empty_segment_is_skipped() {
        let mut s = scanner("''BGM+220'");
        assert_eq!(s.current_segment_id(), Some("BGM"));
        assert_eq!(s.take_errors().len(), 2);
    }

    #[test]
    fn test_repeats() {
        let d = Delimiters {
            repeat: Some('*'),
            ..Delimiters::edifact()
        };
        let s = Scanner::new("RFF+ON:1*ON:2'".to_string(), 0, d, &[]);
        let field = s.data_element_at(1).unwrap();
        assert_eq!(field.repeat_count(), 2);
        assert_eq!(field.repeats[1], vec!["ON", "2"]);
    }

    #[test]
    fn test_undecodable_bytes_are_reported_at_input_offsets() {
        let source = Decoded::new(b"FTX+caf\xe9'NAD+\xff'", Charset::Utf8, false);
        let mut s = Scanner::from_decoded(source, 0, Delimiters::edifact(), &[]);
        assert_eq!(s.data_element_at(1).unwrap().value(), "caf\u{FFFD}");
        assert!(s.advance());
        assert_eq!(s.offset(), 9);
        assert_eq!(s.length(), 5);

        let errors = s.take_errors();
        assert_eq!(errors.len(), 2);
        let first = &errors.as_slice()[0];
        assert_eq!(first.code, ErrorCode::InvalidCharacter);
        assert_eq!(first.id, "FTX");
        assert_eq!(first.offender, Some(Offender::Token { offset: 7 }));
        assert_eq!(errors.as_slice()[1].id, "NAD");
        assert_eq!(errors.as_slice()[1].position, 2);
    }

    #[test]
    fn test_raw_segment_keeps_component_characters() {
        let d = Delimiters::x12();
        let s = Scanner::new("ISA*U*:~".to_string(), 0, d, &["ISA"]);
        assert_eq!(s.data_element_at(2).unwrap().value(), ":");
    }
}
