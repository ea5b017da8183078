//! UN/EDIFACT tokenizer
//!
//! An optional UNA service string advice declares the service characters;
//! without one the syntax defaults apply.

use crate::decode::{Charset, Decoded};
use crate::delimiters::Delimiters;
use crate::scanner::Scanner;
use crate::tokenizer::delegate_to_scanner;
use crate::{Dialect, Error, Result};
use tracing::debug;

/// Length of the UNA service string advice
pub const UNA_LENGTH: usize = 9;

/// Read an optional UNA at the start of `text`
///
/// Returns the delimiters and the byte offset where segments begin.
///
/// # Errors
///
/// Fails for a UNA shorter than nine characters or one whose characters
/// are not distinct.
pub fn discover(text: &str, dialect: Dialect, defaults: Delimiters) -> Result<(Delimiters, usize)> {
    if !text.starts_with("UNA") {
        return Ok((defaults, 0));
    }
    let mut delimiters = Delimiters::from_una(text)
        .ok_or_else(|| Error::malformed(dialect, 0, "UNA service string is shorter than 9 characters"))?;
    delimiters.tag = defaults.tag;

    let specials = delimiters.specials();
    for (i, c) in specials.iter().enumerate() {
        if specials[i + 1..].contains(c) {
            return Err(Error::malformed(
                dialect,
                3,
                format!("service character '{c}' is used twice"),
            ));
        }
    }
    let start: usize = text.chars().take(UNA_LENGTH).map(char::len_utf8).sum();
    debug!(una = %&text[..start], "Discovered service characters from UNA");
    Ok((delimiters, start))
}

/// Tokenizer for EDIFACT interchanges
#[derive(Debug)]
pub struct EdifactTokenizer {
    scanner: Scanner,
}

impl EdifactTokenizer {
    /// Read the UNA (if any) and prime the first segment, which must be UNB
    ///
    /// # Errors
    ///
    /// Fails for a malformed UNA or when no UNB follows it.
    pub fn new(input: &[u8]) -> Result<Self> {
        let source = Decoded::new(input, charset(input), false);
        let (delimiters, start) = open(&source, Dialect::Edifact, Delimiters::edifact())?;
        if !source.text()[start..].trim_start().starts_with("UNB") {
            return Err(Error::malformed(
                Dialect::Edifact,
                source.input_offset(start),
                "interchange does not start with UNB",
            ));
        }
        Ok(Self {
            scanner: Scanner::from_decoded(source, start, delimiters, &[]),
        })
    }
}

/// Discover the service characters of decoded input
///
/// The returned start is an offset into the decoded text; header error
/// offsets refer to the input bytes.
pub(crate) fn open(
    source: &Decoded,
    dialect: Dialect,
    defaults: Delimiters,
) -> Result<(Delimiters, usize)> {
    let lead = source.content_start();
    let (delimiters, start) = discover(&source.text()[lead..], dialect, defaults)
        .map_err(|e| e.shifted(source.input_offset(lead)))?;
    Ok((delimiters, lead + start))
}

/// Character set of an interchange
///
/// Input that is valid UTF-8 is read as such. Otherwise a UNOC syntax
/// identifier selects ISO 8859-1, and any other bytes that do not decode
/// are reported by the scanner.
#[must_use]
pub fn charset(input: &[u8]) -> Charset {
    if std::str::from_utf8(input).is_ok() {
        return Charset::Utf8;
    }
    let declared = input
        .windows(3)
        .position(|w| w == b"UNB")
        .and_then(|at| input.get(at + 4..at + 8));
    if declared == Some(b"UNOC".as_slice()) {
        debug!("Reading UNOC interchange as ISO 8859-1");
        Charset::Latin1
    } else {
        Charset::Utf8
    }
}

delegate_to_scanner!(EdifactTokenizer, Dialect::Edifact);
