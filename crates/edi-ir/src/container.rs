//! Container ontology
//!
//! The set of container kinds is closed. Each kind has a rank (lower ranks
//! sit higher in the tree) and a fixed list of kinds it may hold directly.
//! Template construction and runtime insertion both consult this table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of containers in a template or runtime tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    /// Interchange envelope (ISA/IEA, UNB/UNZ, STX/END)
    Envelope,
    /// Functional group (GS/GE, UNG/UNE)
    FunctionalGroup,
    /// Transaction set or message (ST/SE, UNH/UNT, MHD/MTR)
    TransactionSet,
    /// Header, detail or summary table
    Table,
    /// Repeating group of segments
    Loop,
    /// Segment
    Segment,
    /// Composite element
    CompositeElement,
    /// Simple data element
    DataElement,
}

const ENVELOPE_CHILDREN: &[ContainerType] =
    &[ContainerType::Segment, ContainerType::FunctionalGroup];
const GROUP_CHILDREN: &[ContainerType] =
    &[ContainerType::Segment, ContainerType::TransactionSet];
const TRANSACTION_CHILDREN: &[ContainerType] = &[ContainerType::Table];
const TABLE_CHILDREN: &[ContainerType] = &[ContainerType::Segment, ContainerType::Loop];
const LOOP_CHILDREN: &[ContainerType] = &[ContainerType::Segment, ContainerType::Loop];
const SEGMENT_CHILDREN: &[ContainerType] =
    &[ContainerType::DataElement, ContainerType::CompositeElement];
const COMPOSITE_CHILDREN: &[ContainerType] = &[ContainerType::DataElement];

impl ContainerType {
    /// Every kind, in rank order
    pub const ALL: [ContainerType; 8] = [
        ContainerType::Envelope,
        ContainerType::FunctionalGroup,
        ContainerType::TransactionSet,
        ContainerType::Table,
        ContainerType::Loop,
        ContainerType::Segment,
        ContainerType::CompositeElement,
        ContainerType::DataElement,
    ];

    /// Nesting rank: Envelope is 0, DataElement is 7
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            ContainerType::Envelope => 0,
            ContainerType::FunctionalGroup => 1,
            ContainerType::TransactionSet => 2,
            ContainerType::Table => 3,
            ContainerType::Loop => 4,
            ContainerType::Segment => 5,
            ContainerType::CompositeElement => 6,
            ContainerType::DataElement => 7,
        }
    }

    /// Kinds this kind may hold directly
    #[must_use]
    pub const fn allowed_children(self) -> &'static [ContainerType] {
        match self {
            ContainerType::Envelope => ENVELOPE_CHILDREN,
            ContainerType::FunctionalGroup => GROUP_CHILDREN,
            ContainerType::TransactionSet => TRANSACTION_CHILDREN,
            ContainerType::Table => TABLE_CHILDREN,
            ContainerType::Loop => LOOP_CHILDREN,
            ContainerType::Segment => SEGMENT_CHILDREN,
            ContainerType::CompositeElement => COMPOSITE_CHILDREN,
            ContainerType::DataElement => &[],
        }
    }

    /// Whether `child` may be placed directly under `self`
    #[must_use]
    pub fn can_contain(self, child: ContainerType) -> bool {
        self.allowed_children().contains(&child)
    }

    /// Element kinds live inside segments rather than in the segment stream
    #[must_use]
    pub const fn is_element(self) -> bool {
        matches!(
            self,
            ContainerType::CompositeElement | ContainerType::DataElement
        )
    }

    /// Envelope, group and transaction levels own a header/trailer pair
    #[must_use]
    pub const fn is_control_level(self) -> bool {
        matches!(
            self,
            ContainerType::Envelope | ContainerType::FunctionalGroup | ContainerType::TransactionSet
        )
    }

    /// Kinds that appear in the segment stream and start with a segment
    #[must_use]
    pub const fn is_segment_group(self) -> bool {
        matches!(
            self,
            ContainerType::Loop | ContainerType::FunctionalGroup | ContainerType::TransactionSet
        )
    }

    /// Short lowercase name used in reports and template files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ContainerType::Envelope => "envelope",
            ContainerType::FunctionalGroup => "functional_group",
            ContainerType::TransactionSet => "transaction_set",
            ContainerType::Table => "table",
            ContainerType::Loop => "loop",
            ContainerType::Segment => "segment",
            ContainerType::CompositeElement => "composite_element",
            ContainerType::DataElement => "data_element",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `parent` may directly hold `child`
#[must_use]
pub fn containment_allowed(parent: ContainerType, child: ContainerType) -> bool {
    parent.can_contain(child)
}

/// Nesting rank of `kind`
#[must_use]
pub fn rank(kind: ContainerType) -> u8 {
    kind.rank()
}

/// Reject an illegal (parent, child) pairing with a structural error
///
/// # Errors
///
/// Returns [`crate::Error::IllegalContainment`] when the table has no entry
/// for the pair.
pub fn check_containment(parent: ContainerType, child: ContainerType) -> crate::Result<()> {
    if parent.can_contain(child) {
        Ok(())
    } else {
        Err(crate::Error::IllegalContainment { parent, child })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_are_ordered() {
        for pair in ContainerType::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
        assert_eq!(rank(ContainerType::Envelope), 0);
        assert_eq!(rank(ContainerType::DataElement), 7);
    }

    #[test]
    fn test_listed_pairs_are_allowed() {
        assert!(containment_allowed(ContainerType::Loop, ContainerType::Segment));
        assert!(containment_allowed(ContainerType::Loop, ContainerType::Loop));
        assert!(containment_allowed(
            ContainerType::Segment,
            ContainerType::CompositeElement
        ));
        assert!(containment_allowed(
            ContainerType::Envelope,
            ContainerType::FunctionalGroup
        ));
    }

    #[test]
    fn test_unlisted_pairs_are_rejected() {
        let listed = [
            (ContainerType::Envelope, ContainerType::Segment),
            (ContainerType::Envelope, ContainerType::FunctionalGroup),
            (ContainerType::FunctionalGroup, ContainerType::Segment),
            (ContainerType::FunctionalGroup, ContainerType::TransactionSet),
            (ContainerType::TransactionSet, ContainerType::Table),
            (ContainerType::Table, ContainerType::Segment),
            (ContainerType::Table, ContainerType::Loop),
            (ContainerType::Loop, ContainerType::Segment),
            (ContainerType::Loop, ContainerType::Loop),
            (ContainerType::Segment, ContainerType::DataElement),
            (ContainerType::Segment, ContainerType::CompositeElement),
            (ContainerType::CompositeElement, ContainerType::DataElement),
        ];

        for parent in ContainerType::ALL {
            for child in ContainerType::ALL {
                let expected = listed.contains(&(parent, child));
                assert_eq!(
                    containment_allowed(parent, child),
                    expected,
                    "{parent} -> {child}"
                );
            }
        }
    }

    #[test]
    fn test_envelope_cannot_hold_data_element() {
        let err = check_containment(ContainerType::Envelope, ContainerType::DataElement)
            .unwrap_err();
        assert_eq!(
            err,
            crate::Error::IllegalContainment {
                parent: ContainerType::Envelope,
                child: ContainerType::DataElement,
            }
        );
    }

    #[test]
    fn test_only_loop_is_self_containing() {
        for kind in ContainerType::ALL {
            assert_eq!(kind.can_contain(kind), kind == ContainerType::Loop);
        }
        // every other edge goes strictly down in rank
        for parent in ContainerType::ALL {
            for child in parent.allowed_children() {
                assert!(child.rank() > parent.rank() || *child == ContainerType::Loop);
            }
        }
    }
}
