//! Field tokens

/// One field of a segment: repeats, each a list of components
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldToken {
    pub repeats: Vec<Vec<String>>,
}

impl FieldToken {
    /// A single-valued field
    pub fn simple(value: impl Into<String>) -> Self {
        Self {
            repeats: vec![vec![value.into()]],
        }
    }

    /// First component of the first repeat, or ""
    #[must_use]
    pub fn value(&self) -> &str {
        self.repeats
            .first()
            .and_then(|r| r.first())
            .map_or("", String::as_str)
    }

    /// Component at 1-based `position` of the first repeat
    #[must_use]
    pub fn component(&self, position: usize) -> Option<&str> {
        let index = position.checked_sub(1)?;
        self.repeats.first()?.get(index).map(String::as_str)
    }

    /// Whether every component of every repeat is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repeats.iter().flatten().all(String::is_empty)
    }

    #[must_use]
    pub fn repeat_count(&self) -> usize {
        self.repeats.len()
    }

    /// Whether any repeat carries more than one component
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.repeats.iter().any(|r| r.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let token = FieldToken {
            repeats: vec![
                vec!["HC".to_string(), "99213".to_string()],
                vec!["HC".to_string()],
            ],
        };
        assert_eq!(token.value(), "HC");
        assert_eq!(token.component(2), Some("99213"));
        assert_eq!(token.component(0), None);
        assert!(token.is_composite());
        assert_eq!(token.repeat_count(), 2);
        assert!(!token.is_empty());
        assert!(FieldToken::default().is_empty());
        assert!(FieldToken::simple("").is_empty());
    }
}
