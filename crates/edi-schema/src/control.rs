//! Header/trailer linkage of control levels

use edi_ir::ContainerType;
use serde::{Deserialize, Serialize};

/// What the trailer's count field counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "of")]
pub enum CountKind {
    /// Every segment inside the container, header and trailer included
    Segments,
    /// Containers of the given kind anywhere below (groups, transaction sets)
    Containers(ContainerType),
}

/// Control linkage of an Envelope, FunctionalGroup or TransactionSet
///
/// Field positions are 1-based. `ISA13`/`IEA02` carry the interchange
/// control number and `IEA01` the number of functional groups, so the X12
/// interchange link is `ControlLink::new("ISA", "IEA").numbers(13, 2)
/// .count(1, CountKind::Containers(ContainerType::FunctionalGroup))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlLink {
    /// Header segment id
    pub header: String,
    /// Trailer segment id
    pub trailer: String,
    /// Control number field in the header
    #[serde(default)]
    pub header_number: Option<usize>,
    /// Control number field in the trailer
    #[serde(default)]
    pub trailer_number: Option<usize>,
    /// Count field in the trailer
    #[serde(default)]
    pub count_field: Option<usize>,
    /// What the count field counts
    #[serde(default = "default_count")]
    pub count: CountKind,
}

fn default_count() -> CountKind {
    CountKind::Segments
}

impl ControlLink {
    pub fn new(header: impl Into<String>, trailer: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            trailer: trailer.into(),
            header_number: None,
            trailer_number: None,
            count_field: None,
            count: CountKind::Segments,
        }
    }

    /// Control number positions in header and trailer
    #[must_use]
    pub fn numbers(mut self, header: usize, trailer: usize) -> Self {
        self.header_number = Some(header);
        self.trailer_number = Some(trailer);
        self
    }

    /// Trailer count position and what it counts
    #[must_use]
    pub fn count(mut self, field: usize, kind: CountKind) -> Self {
        self.count_field = Some(field);
        self.count = kind;
        self
    }

    /// X12 ISA/IEA
    #[must_use]
    pub fn x12_interchange() -> Self {
        Self::new("ISA", "IEA")
            .numbers(13, 2)
            .count(1, CountKind::Containers(ContainerType::FunctionalGroup))
    }

    /// X12 GS/GE
    #[must_use]
    pub fn x12_group() -> Self {
        Self::new("GS", "GE")
            .numbers(6, 2)
            .count(1, CountKind::Containers(ContainerType::TransactionSet))
    }

    /// X12 ST/SE
    #[must_use]
    pub fn x12_transaction() -> Self {
        Self::new("ST", "SE").numbers(2, 2).count(1, CountKind::Segments)
    }

    /// EDIFACT UNB/UNZ, counting messages (no UNG groups)
    #[must_use]
    pub fn edifact_interchange() -> Self {
        Self::new("UNB", "UNZ")
            .numbers(5, 2)
            .count(1, CountKind::Containers(ContainerType::TransactionSet))
    }

    /// TRADACOMS STX/END, counting messages
    #[must_use]
    pub fn tradacoms_interchange() -> Self {
        Self::new("STX", "END").count(1, CountKind::Containers(ContainerType::TransactionSet))
    }

    /// EDIFACT UNH/UNT
    #[must_use]
    pub fn edifact_message() -> Self {
        Self::new("UNH", "UNT").numbers(1, 2).count(1, CountKind::Segments)
    }

    /// TRADACOMS MHD/MTR
    #[must_use]
    pub fn tradacoms_message() -> Self {
        Self::new("MHD", "MTR").count(1, CountKind::Segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let st = ControlLink::x12_transaction();
        assert_eq!(st.header, "ST");
        assert_eq!(st.header_number, Some(2));
        assert_eq!(st.count_field, Some(1));
        assert_eq!(st.count, CountKind::Segments);
        assert_eq!(ControlLink::tradacoms_message().header_number, None);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let link: ControlLink = serde_json::from_str(
            r#"{"header":"GS","trailer":"GE","count_field":1,"count":{"kind":"containers","of":"transaction_set"}}"#,
        )
        .unwrap();
        assert_eq!(link.trailer_number, None);
        assert_eq!(link.count, CountKind::Containers(ContainerType::TransactionSet));
    }
}
