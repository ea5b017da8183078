//! The tokenizer contract the parser drives

use crate::delimiters::Delimiters;
use crate::token::FieldToken;
use crate::Dialect;
use edi_ir::{DocumentErrors, ErrorCode, Position, Severity};

/// Segment-at-a-time view of a document
///
/// A tokenizer is always positioned on one undecided segment (or exhausted).
/// The parser peeks its id, may inspect fields by position, and either
/// consumes the fields with [`next_data_element`](Tokenizer::next_data_element)
/// or rewinds with [`reset_segment`](Tokenizer::reset_segment) before moving
/// on with [`next_segment`](Tokenizer::next_segment).
pub trait Tokenizer {
    fn dialect(&self) -> Dialect;

    /// Delimiters in effect; `None` for fixed-width input
    fn delimiters(&self) -> Option<&Delimiters>;

    /// Id of the current segment, `None` once input is exhausted
    fn current_segment_id(&self) -> Option<&str>;

    /// Next field of the current segment
    fn next_data_element(&mut self) -> Option<FieldToken>;

    /// Field at 1-based position `n` of the current segment, cursor untouched
    fn data_element_at(&self, n: usize) -> Option<&FieldToken>;

    /// Number of fields in the current segment
    fn field_count(&self) -> usize;

    /// Rewind the field cursor to the start of the current segment
    fn reset_segment(&mut self);

    /// Drop the current segment and load the next; false when exhausted
    fn next_segment(&mut self) -> bool;

    /// Byte offset of the current segment
    fn input_byte_count(&self) -> usize;

    /// 1-based ordinal of the current segment
    fn segment_ordinal(&self) -> usize;

    /// Length in bytes of the current segment, terminator excluded
    fn segment_length(&self) -> usize;

    /// Record a lexical problem at the current segment
    fn report_error(&mut self, code: ErrorCode, severity: Severity, message: &str);

    /// Hand over the problems recorded so far
    fn take_errors(&mut self) -> DocumentErrors;

    /// Next `width` characters of a fixed-width record
    fn next_fixed_field(&mut self, _width: usize) -> Option<String> {
        None
    }

    /// Whether fields are cut by width rather than by delimiter
    fn is_fixed_width(&self) -> bool {
        false
    }

    fn is_exhausted(&self) -> bool {
        self.current_segment_id().is_none()
    }

    fn position(&self) -> Position {
        Position::new(
            self.segment_ordinal(),
            self.input_byte_count(),
            self.segment_length(),
        )
    }
}

/// Implement [`Tokenizer`] for a wrapper around a [`Scanner`](crate::scanner::Scanner)
macro_rules! delegate_to_scanner {
    ($ty:ty, $dialect:expr) => {
        impl $crate::tokenizer::Tokenizer for $ty {
            fn dialect(&self) -> $crate::Dialect {
                $dialect
            }

            fn delimiters(&self) -> Option<&$crate::delimiters::Delimiters> {
                Some(self.scanner.delimiters())
            }

            fn current_segment_id(&self) -> Option<&str> {
                self.scanner.current_segment_id()
            }

            fn next_data_element(&mut self) -> Option<$crate::token::FieldToken> {
                self.scanner.next_data_element()
            }

            fn data_element_at(&self, n: usize) -> Option<&$crate::token::FieldToken> {
                self.scanner.data_element_at(n)
            }

            fn field_count(&self) -> usize {
                self.scanner.field_count()
            }

            fn reset_segment(&mut self) {
                self.scanner.reset_segment();
            }

            fn next_segment(&mut self) -> bool {
                self.scanner.advance()
            }

            fn input_byte_count(&self) -> usize {
                self.scanner.offset()
            }

            fn segment_ordinal(&self) -> usize {
                self.scanner.ordinal()
            }

            fn segment_length(&self) -> usize {
                self.scanner.length()
            }

            fn report_error(
                &mut self,
                code: edi_ir::ErrorCode,
                severity: edi_ir::Severity,
                message: &str,
            ) {
                self.scanner.report_error(code, severity, message);
            }

            fn take_errors(&mut self) -> edi_ir::DocumentErrors {
                self.scanner.take_errors()
            }
        }
    };
}

pub(crate) use delegate_to_scanner;
