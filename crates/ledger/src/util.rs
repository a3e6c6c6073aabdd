//! Internal helpers for input validation and conversion.
//!
//! These utilities are **not** part of the public API.

use uuid::Uuid;

use crate::{LedgerError, ResultLedger};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultLedger<Uuid> {
    Uuid::parse_str(value).map_err(|_| LedgerError::KeyNotFound(format!("invalid {label} id")))
}

/// Trim an identifier supplied by a caller, rejecting empty ones.
pub(crate) fn require_id(value: &str, label: &str) -> ResultLedger<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidAmount(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_id_trims_and_rejects_blank() {
        assert_eq!(require_id("  centro ", "location_id").unwrap(), "centro");
        assert_eq!(
            require_id("   ", "location_id"),
            Err(LedgerError::InvalidAmount(
                "location_id must not be empty".to_string()
            ))
        );
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(normalize_optional_text(Some("  ")), None);
        assert_eq!(
            normalize_optional_text(Some(" cierre ")),
            Some("cierre".to_string())
        );
        assert_eq!(normalize_optional_text(None), None);
    }
}
