//! X12 interchange tokenizer
//!
//! Delimiters come from the fixed-length ISA header: the byte at index 3
//! separates fields, index 104 separates components, index 82 (ISA11)
//! holds the repetition separator when it is not alphanumeric, and the
//! byte at index 105 terminates segments.

use crate::decode::{Charset, Decoded};
use crate::delimiters::Delimiters;
use crate::scanner::Scanner;
use crate::tokenizer::delegate_to_scanner;
use crate::{Dialect, Error, Result};
use tracing::debug;

/// Length of the ISA segment up to and including its terminator
pub const ISA_LENGTH: usize = 106;

const FIELD_INDEX: usize = 3;
const REPEAT_INDEX: usize = 82;
const COMPONENT_INDEX: usize = 104;
const TERMINATOR_INDEX: usize = 105;

/// Byte offsets of the 16 field separators inside the ISA header
const SEPARATOR_OFFSETS: [usize; 16] = [
    3, 6, 17, 20, 31, 34, 50, 53, 69, 76, 81, 83, 89, 99, 101, 103,
];

/// Read the delimiters from an ISA header at the start of `input`
///
/// # Errors
///
/// Fails when the header is short or its separators are not where the
/// fixed layout puts them.
pub fn discover(input: &[u8]) -> Result<Delimiters> {
    if !input.starts_with(b"ISA") {
        return Err(Error::malformed(Dialect::X12, 0, "input does not start with ISA"));
    }
    if input.len() < ISA_LENGTH {
        return Err(Error::malformed(
            Dialect::X12,
            input.len(),
            format!("ISA header needs {ISA_LENGTH} bytes, found {}", input.len()),
        ));
    }

    let field = input[FIELD_INDEX];
    if let Some(offset) = SEPARATOR_OFFSETS.iter().find(|&&o| input[o] != field) {
        return Err(Error::malformed(
            Dialect::X12,
            *offset,
            format!(
                "expected field separator '{}' at byte {offset}",
                char::from(field)
            ),
        ));
    }

    let component = input[COMPONENT_INDEX];
    let terminator = input[TERMINATOR_INDEX];
    if terminator == field || terminator == component || terminator.is_ascii_alphanumeric() {
        return Err(Error::malformed(
            Dialect::X12,
            TERMINATOR_INDEX,
            "segment terminator collides with another delimiter",
        ));
    }
    let repeat = input[REPEAT_INDEX];
    let repeat = (!repeat.is_ascii_alphanumeric() && repeat != field && repeat != component)
        .then_some(char::from(repeat));

    let delimiters = Delimiters {
        segment: if terminator == b'\r' { '\n' } else { char::from(terminator) },
        field: char::from(field),
        component: char::from(component),
        repeat,
        release: None,
        tag: None,
        decimal: '.',
    };
    debug!(
        field = %delimiters.field,
        component = %delimiters.component,
        repeat = ?delimiters.repeat,
        segment = ?delimiters.segment,
        "Discovered X12 delimiters"
    );
    Ok(delimiters)
}

/// Tokenizer for X12 interchanges
#[derive(Debug)]
pub struct X12Tokenizer {
    scanner: Scanner,
}

impl X12Tokenizer {
    /// Discover delimiters from the ISA header and prime the first segment
    ///
    /// # Errors
    ///
    /// Fails when the ISA header is malformed.
    pub fn new(input: &[u8]) -> Result<Self> {
        let header = input
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(input.len());
        let delimiters = discover(&input[header..]).map_err(|e| e.shifted(header))?;

        // A CR/LF terminator is normalized to a single newline
        let source = Decoded::new(input, Charset::Utf8, delimiters.segment == '\n');
        let start = source.content_start();
        Ok(Self {
            scanner: Scanner::from_decoded(source, start, delimiters, &["ISA"]),
        })
    }
}

delegate_to_scanner!(X12Tokenizer, Dialect::X12);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    pub(crate) const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*^*00501*000000001*0*P*:~";

    #[test]
    fn test_header_is_106_bytes() {
        assert_eq!(ISA.len(), ISA_LENGTH);
    }

    #[test]
    fn test_discover_delimiters() {
        let d = discover(ISA.as_bytes()).unwrap();
        assert_eq!(d.field, '*');
        assert_eq!(d.component, ':');
        assert_eq!(d.repeat, Some('^'));
        assert_eq!(d.segment, '~');
    }

    #[test]
    fn test_repeat_probe_ignores_letter() {
        let old = ISA.replacen("*^*", "*U*", 1);
        assert_eq!(discover(old.as_bytes()).unwrap().repeat, None);
    }

    #[test]
    fn test_short_header_is_malformed() {
        let err = discover(b"ISA*00*").unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { dialect: Dialect::X12, .. }));
    }

    #[test]
    fn test_misplaced_separator_is_malformed() {
        let bad = ISA.replacen("*00*  ", "*000   ", 1);
        assert!(discover(bad.as_bytes()).is_err());
    }

    #[test]
    fn test_crlf_terminator_is_normalized() {
        let input = format!("{}\r\nGS*PO*S*R*20240101*1200*1*X*005010\r\n", &ISA[..105]);
        let mut t = X12Tokenizer::new(input.as_bytes()).unwrap();
        assert_eq!(t.delimiters().unwrap().segment, '\n');
        assert_eq!(t.current_segment_id(), Some("ISA"));
        assert!(t.next_segment());
        assert_eq!(t.current_segment_id(), Some("GS"));
        assert_eq!(t.data_element_at(1).unwrap().value(), "PO");
    }

    #[test]
    fn test_offsets_refer_to_caller_input() {
        let input = format!(
            "\r\n  {}\r\nGS*PO*S*R*20240101*1200*1*X*005010\r\nST*850*0001\r\n",
            &ISA[..105]
        );
        let mut t = X12Tokenizer::new(input.as_bytes()).unwrap();
        assert_eq!(t.input_byte_count(), 4);
        assert_eq!(t.segment_length(), 105);
        assert!(t.next_segment());
        assert_eq!(t.input_byte_count(), input.find("GS*").unwrap());
        assert!(t.next_segment());
        assert_eq!(t.input_byte_count(), input.find("ST*").unwrap());
        assert_eq!(t.segment_length(), "ST*850*0001".len());
    }

    #[test]
    fn test_header_errors_point_past_leading_whitespace() {
        let err = X12Tokenizer::new(b"\n\nISA*00*").unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { offset: 9, .. }));
    }

    #[test]
    fn test_isa16_keeps_component_separator() {
        let t = X12Tokenizer::new(ISA.as_bytes()).unwrap();
        assert_eq!(t.data_element_at(16).unwrap().value(), ":");
        assert_eq!(t.data_element_at(11).unwrap().value(), "^");
        assert_eq!(t.field_count(), 16);
    }

    #[test]
    fn test_repeats_and_components_after_header() {
        let input = format!("{ISA}\nREF*ZZ*A:B^C:D~");
        let mut t = X12Tokenizer::new(input.as_bytes()).unwrap();
        assert!(t.next_segment());
        let field = t.data_element_at(2).unwrap();
        assert_eq!(field.repeats, vec![vec!["A", "B"], vec!["C", "D"]]);
        assert_eq!(t.input_byte_count(), ISA_LENGTH + 1);
    }
}
