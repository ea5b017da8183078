//! Placeholder substitution pass

use crate::prebuild::{self, COMPONENT, FIELD, REPEAT, SEGMENT, TAG};
use crate::{Error, Result};
use edi_dialect::Delimiters;
use tracing::{debug, trace};

/// Replaces placeholder delimiters with a real delimiter set
///
/// Data characters that collide with a real delimiter are prefixed with
/// the release character; without one (X12) the collision is an error.
/// The first segment is copied unescaped: it is the header that declares
/// the delimiters.
#[derive(Debug, Clone)]
pub struct Substitution {
    delimiters: Delimiters,
    line_breaks: bool,
    segments: usize,
}

impl Substitution {
    #[must_use]
    pub fn new(delimiters: Delimiters, line_breaks: bool) -> Self {
        Self {
            delimiters,
            line_breaks,
            segments: 0,
        }
    }

    #[must_use]
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Segments substituted so far
    #[must_use]
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Substitute one prebuilt segment, appending the result to `out`
    ///
    /// # Errors
    ///
    /// Fails when data contains a delimiter and there is no release
    /// character to escape it with, or when a field repeats and the set
    /// has no repetition separator.
    pub fn push(&mut self, segment: &str, out: &mut String) -> Result<()> {
        let ordinal = self.segments + 1;
        let escape = self.segments > 0;
        let d = self.delimiters;
        let mut terminated = false;

        for c in segment.chars() {
            match c {
                SEGMENT => {
                    out.push(d.segment);
                    if self.line_breaks && d.segment != '\n' {
                        out.push('\n');
                    }
                    terminated = true;
                }
                FIELD => out.push(d.field),
                COMPONENT => out.push(d.component),
                REPEAT => match d.repeat {
                    Some(repeat) => out.push(repeat),
                    None => {
                        return Err(Error::NoRepeatSeparator {
                            segment: segment_id(segment),
                            ordinal,
                        });
                    }
                },
                TAG => out.push(d.tag.unwrap_or(d.field)),
                c if escape && d.is_special(c) => match d.release {
                    Some(release) => {
                        out.push(release);
                        out.push(c);
                    }
                    None => {
                        return Err(Error::Collision {
                            segment: segment_id(segment),
                            ordinal,
                            character: c,
                        });
                    }
                },
                c => out.push(c),
            }
        }

        trace!(ordinal, terminated, "Substituted segment");
        self.segments += 1;
        Ok(())
    }

    /// Substitute a whole prebuilt document
    ///
    /// # Errors
    ///
    /// See [`Substitution::push`].
    pub fn run(mut self, prebuilt: &str) -> Result<String> {
        let mut out = String::with_capacity(prebuilt.len() + prebuilt.len() / 8);
        for segment in prebuilt.split_inclusive(SEGMENT) {
            self.push(segment, &mut out)?;
        }
        debug!(segments = self.segments, "Substitution pass finished");
        Ok(out)
    }
}

fn segment_id(segment: &str) -> String {
    segment
        .split(prebuild::is_placeholder)
        .next()
        .unwrap_or_default()
        .to_string()
}
