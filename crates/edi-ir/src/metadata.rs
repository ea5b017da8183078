//! Source positions for error reporting

use serde::{Deserialize, Serialize};

/// Where a segment was read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-based ordinal of the segment in the input
    pub segment: usize,

    /// Byte offset of the segment from start of input
    pub offset: usize,

    /// Length in bytes, terminator excluded
    pub length: usize,
}

impl Position {
    /// Create a new position
    #[must_use]
    pub fn new(segment: usize, offset: usize, length: usize) -> Self {
        Self {
            segment,
            offset,
            length,
        }
    }

    /// Byte offset one past the end of the segment
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_end() {
        let position = Position::new(3, 120, 17);
        assert_eq!(position.end(), 137);
        assert_eq!(position.segment, 3);
    }

    #[test]
    fn test_position_serialization() {
        let position = Position::new(1, 0, 105);
        let json = serde_json::to_string(&position).unwrap();
        assert_eq!(json, r#"{"segment":1,"offset":0,"length":105}"#);
    }
}
