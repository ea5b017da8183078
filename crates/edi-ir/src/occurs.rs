//! Repeat limits for template slots and repeating elements

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of instances a slot may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occurs {
    /// At most `n` instances (`n >= 1`)
    Bounded(usize),
    /// No upper limit
    Unbounded,
}

impl Occurs {
    /// Exactly one instance
    pub const ONCE: Occurs = Occurs::Bounded(1);

    /// Whether one more instance may be added to `existing`
    #[must_use]
    pub fn can_add(self, existing: usize) -> bool {
        match self {
            Occurs::Bounded(limit) => existing < limit,
            Occurs::Unbounded => true,
        }
    }

    /// Whether the slot may hold more than one instance
    #[must_use]
    pub fn is_repeatable(self) -> bool {
        !matches!(self, Occurs::Bounded(0 | 1))
    }

    /// Upper limit, if any
    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            Occurs::Bounded(limit) => Some(limit),
            Occurs::Unbounded => None,
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::ONCE
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurs::Bounded(limit) => write!(f, "{limit}"),
            Occurs::Unbounded => f.write_str(">1"),
        }
    }
}

impl FromStr for Occurs {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        match trimmed {
            "*" | ">1" | "unbounded" => Ok(Occurs::Unbounded),
            _ => match trimmed.parse::<usize>() {
                Ok(0) | Err(_) => Err(crate::Error::invalid_value(
                    "occurs",
                    format!("'{trimmed}' is not a repeat count"),
                )),
                Ok(limit) => Ok(Occurs::Bounded(limit)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_limits() {
        let occurs = Occurs::Bounded(2);
        assert!(occurs.can_add(0));
        assert!(occurs.can_add(1));
        assert!(!occurs.can_add(2));
        assert!(occurs.is_repeatable());
        assert!(!Occurs::ONCE.is_repeatable());
    }

    #[test]
    fn test_unbounded() {
        assert!(Occurs::Unbounded.can_add(10_000));
        assert!(Occurs::Unbounded.limit().is_none());
    }

    #[test]
    fn test_parse() {
        assert_eq!("1".parse::<Occurs>().unwrap(), Occurs::ONCE);
        assert_eq!("25".parse::<Occurs>().unwrap(), Occurs::Bounded(25));
        assert_eq!(">1".parse::<Occurs>().unwrap(), Occurs::Unbounded);
        assert_eq!("*".parse::<Occurs>().unwrap(), Occurs::Unbounded);
        assert!("0".parse::<Occurs>().is_err());
        assert!("many".parse::<Occurs>().is_err());
    }
}
