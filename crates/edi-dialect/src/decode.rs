//! Input bytes to scanner text
//!
//! Scanning works on `char`s, so offsets into the decoded text drift from
//! offsets into the caller's bytes wherever a character's encoded width
//! changes or input is collapsed. [`Decoded`] keeps a sparse map of those
//! points so every reported position refers to the original input.

/// Character set of the input bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    /// ISO 8859-1, one byte per character
    Latin1,
}

/// Decoded text plus the offset map back to the input
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    text: String,
    /// `(text offset, input offset)` at every point the two diverge
    marks: Vec<(usize, usize)>,
    /// Input offset and value of every byte the charset could not decode
    invalid: Vec<(usize, u8)>,
}

impl From<String> for Decoded {
    fn from(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }
}

struct Builder {
    decoded: Decoded,
    collapse_crlf: bool,
    after_cr: bool,
}

impl Builder {
    fn push(&mut self, input_offset: usize, c: char, width: usize) {
        let mut c = c;
        if self.collapse_crlf {
            if c == '\n' && self.after_cr {
                self.after_cr = false;
                self.mark(input_offset + width);
                return;
            }
            self.after_cr = c == '\r';
            if c == '\r' {
                c = '\n';
            }
        }
        self.decoded.text.push(c);
        if c.len_utf8() != width {
            self.mark(input_offset + width);
        }
    }

    fn mark(&mut self, input_offset: usize) {
        let text_offset = self.decoded.text.len();
        match self.decoded.marks.last_mut() {
            Some(last) if last.0 == text_offset => last.1 = input_offset,
            _ => self.decoded.marks.push((text_offset, input_offset)),
        }
    }
}

impl Decoded {
    /// Decode `input`, optionally folding CR LF and lone CR into LF
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD and are listed in
    /// [`Decoded::invalid`].
    #[must_use]
    pub fn new(input: &[u8], charset: Charset, collapse_crlf: bool) -> Self {
        let mut builder = Builder {
            decoded: Decoded {
                text: String::with_capacity(input.len()),
                ..Self::default()
            },
            collapse_crlf,
            after_cr: false,
        };
        match charset {
            Charset::Latin1 => {
                for (offset, byte) in input.iter().enumerate() {
                    builder.push(offset, char::from(*byte), 1);
                }
            }
            Charset::Utf8 => {
                let mut offset = 0;
                for chunk in input.utf8_chunks() {
                    for c in chunk.valid().chars() {
                        builder.push(offset, c, c.len_utf8());
                        offset += c.len_utf8();
                    }
                    let invalid = chunk.invalid();
                    if let Some(first) = invalid.first() {
                        builder.decoded.invalid.push((offset, *first));
                        builder.push(offset, char::REPLACEMENT_CHARACTER, invalid.len());
                        offset += invalid.len();
                    }
                }
            }
        }
        builder.decoded
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bytes that did not decode, by input offset
    #[must_use]
    pub fn invalid(&self) -> &[(usize, u8)] {
        &self.invalid
    }

    /// Input offset of the character at `text_offset`
    #[must_use]
    pub fn input_offset(&self, text_offset: usize) -> usize {
        let index = self.marks.partition_point(|(t, _)| *t <= text_offset);
        match index.checked_sub(1).map(|i| self.marks[i]) {
            Some((t, i)) => i + (text_offset - t),
            None => text_offset,
        }
    }

    /// Offset of the first non-whitespace character
    #[must_use]
    pub fn content_start(&self) -> usize {
        self.text.len() - self.text.trim_start().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_identity() {
        let d = Decoded::new(b"BGM+220'", Charset::Utf8, false);
        assert_eq!(d.text(), "BGM+220'");
        assert_eq!(d.input_offset(4), 4);
        assert!(d.invalid().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_listed() {
        let d = Decoded::new(b"FTX+caf\xe9'NXT'", Charset::Utf8, false);
        assert_eq!(d.text(), "FTX+caf\u{FFFD}'NXT'");
        assert_eq!(d.invalid(), &[(7, 0xE9)]);
        // U+FFFD takes three bytes of text for one byte of input
        let nxt = d.text().find("NXT").unwrap();
        assert_eq!(nxt, 11);
        assert_eq!(d.input_offset(nxt), 9);
    }

    #[test]
    fn test_latin1_keeps_every_byte() {
        let d = Decoded::new(b"caf\xe9'X", Charset::Latin1, false);
        assert_eq!(d.text(), "caf\u{e9}'X");
        assert!(d.invalid().is_empty());
        assert_eq!(d.input_offset(d.text().find('X').unwrap()), 5);
    }

    #[test]
    fn test_crlf_collapse_tracks_offsets() {
        let d = Decoded::new(b"A*1\r\nB*2\rC*3\n", Charset::Utf8, true);
        assert_eq!(d.text(), "A*1\nB*2\nC*3\n");
        assert_eq!(d.input_offset(4), 5);
        assert_eq!(d.input_offset(8), 9);
    }

    #[test]
    fn test_multibyte_utf8_is_identity() {
        let d = Decoded::new("NAD+Müller'X".as_bytes(), Charset::Utf8, false);
        let x = d.text().find('X').unwrap();
        assert_eq!(d.input_offset(x), x);
    }

    #[test]
    fn test_content_start() {
        let d = Decoded::new(b"\r\n  UNB", Charset::Utf8, false);
        assert_eq!(d.content_start(), 4);
    }
}
