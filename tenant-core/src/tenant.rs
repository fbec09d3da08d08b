//! Tenant identity.
//!
//! A tenant is keyed by a short alphanumeric id that doubles as the
//! namespace for every external resource it owns, so the id is validated
//! once, here, and carried around as a [`TenantId`] afterwards.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{TenantError, TenantResult};

pub static TENANT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,50}$").expect("static regex"));

pub static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
});

/// Brand ends up inside a database identifier.
pub static BRAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,64}$").expect("static regex"));

pub const EMAIL_MAX_LEN: usize = 75;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Lowercase and validate a raw id.
    pub fn parse(raw: &str) -> TenantResult<Self> {
        if !TENANT_ID_RE.is_match(raw) {
            return Err(TenantError::validation(
                "Tenant name must be alphanumeric and at most 50 characters",
            ));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantId::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

pub fn validate_email(email: &str) -> TenantResult<()> {
    if email.len() > EMAIL_MAX_LEN || !EMAIL_RE.is_match(email) {
        return Err(TenantError::validation(
            "Email must be a valid address of at most 75 characters",
        ));
    }
    Ok(())
}

pub fn validate_brand(brand: &str) -> TenantResult<()> {
    if !BRAND_RE.is_match(brand) {
        return Err(TenantError::validation(
            "Brand must contain only letters, digits and underscores",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lowercases_before_use() {
        let id = TenantId::parse("AcmeCorp1").unwrap();
        assert_eq!(id.as_str(), "acmecorp1");
    }

    #[test]
    fn rejects_empty_and_symbols() {
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse("acme-corp").is_err());
        assert!(TenantId::parse("acme corp").is_err());
        assert!(TenantId::parse("../etc").is_err());
        assert!(TenantId::parse(&"a".repeat(51)).is_err());
        assert!(TenantId::parse(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn deserializes_through_validation() {
        let id: TenantId = serde_json::from_str("\"Acme\"").unwrap();
        assert_eq!(id.as_str(), "acme");
        assert!(serde_json::from_str::<TenantId>("\"a_b\"").is_err());
    }

    #[test]
    fn email_grammar_and_length() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("ops@example").is_err());
        assert!(validate_email("ops@example.c").is_err());

        let long = format!("{}@example.com", "a".repeat(70));
        assert!(long.len() > EMAIL_MAX_LEN);
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn brand_is_identifier_safe() {
        assert!(validate_brand("perls_blue").is_ok());
        assert!(validate_brand("perls; DROP DATABASE x").is_err());
        assert!(validate_brand("").is_err());
    }

    proptest! {
        #[test]
        fn non_matching_ids_are_rejected(raw in "[A-Za-z0-9]{1,50}[-_ .!@#$%/][A-Za-z0-9]{1,10}") {
            prop_assert!(TenantId::parse(&raw).is_err());
        }

        #[test]
        fn matching_ids_are_accepted(raw in "[A-Za-z0-9]{1,50}") {
            let id = TenantId::parse(&raw).unwrap();
            prop_assert_eq!(id.as_str(), raw.to_lowercase());
        }
    }
}
