//! TRADACOMS tokenizer
//!
//! TRADACOMS shares EDIFACT's service characters but separates the segment
//! tag from its first field with `=`. Transmissions open with STX.

use crate::decode::{Charset, Decoded};
use crate::delimiters::Delimiters;
use crate::edifact;
use crate::scanner::Scanner;
use crate::tokenizer::delegate_to_scanner;
use crate::{Dialect, Error, Result};

/// Tokenizer for TRADACOMS transmissions
#[derive(Debug)]
pub struct TradacomsTokenizer {
    scanner: Scanner,
}

impl TradacomsTokenizer {
    /// Honour a leading UNA, then require `STX=`
    ///
    /// # Errors
    ///
    /// Fails for a malformed UNA or when the transmission does not open with STX.
    pub fn new(input: &[u8]) -> Result<Self> {
        let source = Decoded::new(input, Charset::Utf8, false);
        let (delimiters, start) =
            edifact::open(&source, Dialect::Tradacoms, Delimiters::tradacoms())?;
        let opener = format!("STX{}", delimiters.tag.unwrap_or('='));
        if !source.text()[start..].trim_start().starts_with(&opener) {
            return Err(Error::malformed(
                Dialect::Tradacoms,
                source.input_offset(start),
                "transmission does not start with STX=",
            ));
        }
        Ok(Self {
            scanner: Scanner::from_decoded(source, start, delimiters, &[]),
        })
    }
}

delegate_to_scanner!(TradacomsTokenizer, Dialect::Tradacoms);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    const INPUT: &str = "STX=ANA:1+5000000000000:SENDER+5010000000000:RECEIVER+240101:120000+REF1'\nMHD=1+ORDHDR:9'";

    #[test]
    fn test_tag_separator() {
        let mut t = TradacomsTokenizer::new(INPUT.as_bytes()).unwrap();
        assert_eq!(t.current_segment_id(), Some("STX"));
        assert_eq!(t.data_element_at(1).unwrap().repeats[0], vec!["ANA", "1"]);
        assert_eq!(t.data_element_at(5).unwrap().value(), "REF1");
        assert!(t.next_segment());
        assert_eq!(t.current_segment_id(), Some("MHD"));
        assert_eq!(t.data_element_at(2).unwrap().component(1), Some("ORDHDR"));
    }

    #[test]
    fn test_missing_stx_is_malformed() {
        assert!(TradacomsTokenizer::new(b"MHD=1+ORDHDR:9'").is_err());
    }

    #[test]
    fn test_offsets_include_leading_whitespace() {
        let input = format!("\r\n{INPUT}");
        let mut t = TradacomsTokenizer::new(input.as_bytes()).unwrap();
        assert_eq!(t.input_byte_count(), 2);
        assert!(t.next_segment());
        assert_eq!(t.input_byte_count(), input.find("MHD").unwrap());
    }

    #[test]
    fn test_una_is_honoured() {
        let input = "UNA:+.? 'STX=ANA:1+S+R+240101+R1'";
        let t = TradacomsTokenizer::new(input.as_bytes()).unwrap();
        assert_eq!(t.delimiters().unwrap().tag, Some('='));
        assert_eq!(t.current_segment_id(), Some("STX"));
    }
}
