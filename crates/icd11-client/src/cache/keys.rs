//! Cache key layout shared by every backend.

use icd11_core::{EntityRefs, Result, normalize_code};
use sha2::{Digest, Sha256};

pub const TOKEN: &str = "icd11_token";

pub fn code(code: &str) -> String {
    format!("icd11_code_{}", normalize_code(code))
}

pub fn ancestors(entity_id: &str) -> String {
    format!("icd11_ancestors_{}", entity_id.trim())
}

pub fn disease(code: &str) -> String {
    format!("icd11_disease_{}", normalize_code(code))
}

/// `icd11_entity_uri_` followed by the hex SHA-256 of the serialized refs.
pub fn entity_uri(refs: &EntityRefs) -> Result<String> {
    let payload = serde_json::to_vec(refs)?;
    Ok(format!(
        "icd11_entity_uri_{}",
        hex::encode(Sha256::digest(&payload))
    ))
}
