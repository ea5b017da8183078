//! Binary (B) elements, carried as hex text

use super::ElementSpec;
use crate::{Error, Result};

pub(super) fn decode(spec: &ElementSpec, text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::invalid_value(&spec.id, format!("not hex: {e}")))
}

pub(super) fn encode(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

pub(super) fn validate(text: &str) -> Option<String> {
    hex::decode(text).err().map(|e| format!("not hex: {e}"))
}
