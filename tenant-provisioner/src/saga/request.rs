//! Inbound request bodies and their validation.
//!
//! Field rules are declared with `validator`; the character-level rules
//! reuse the tenant-core validators so HTTP and library callers agree.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use tenant_core::{validate_brand, validate_email, TenantError, TenantId, TenantResult};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::steps::SmtpSettings;

fn default_protocol() -> String {
    "tls".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

fn port_from<E: serde::de::Error>(value: PortValue) -> Result<u16, E> {
    let parsed = match value {
        PortValue::Number(n) => u16::try_from(n).ok(),
        PortValue::Text(s) => s.trim().parse::<u16>().ok(),
    };
    parsed
        .filter(|p| *p != 0)
        .ok_or_else(|| E::custom("smtp_port must be a port number"))
}

/// Port given as a JSON number or a numeric string.
fn smtp_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    port_from(PortValue::deserialize(deserializer)?)
}

fn optional_smtp_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Option::<PortValue>::deserialize(deserializer)?
        .map(port_from)
        .transpose()
}

fn rule(code: &'static str, result: TenantResult<()>) -> Result<(), ValidationError> {
    result.map_err(|e| ValidationError::new(code).with_message(Cow::Owned(e.to_string())))
}

fn tenant_rule(value: &str) -> Result<(), ValidationError> {
    rule("tenant", TenantId::parse(value).map(|_| ()))
}

fn email_rule(value: &str) -> Result<(), ValidationError> {
    rule("email", validate_email(value))
}

fn brand_rule(value: &str) -> Result<(), ValidationError> {
    rule("brand", validate_brand(value))
}

/// One message naming every offending field, in field order.
fn flatten(errors: &ValidationErrors) -> TenantError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let message = fields
        .iter()
        .map(|(field, errs)| {
            let detail = errs
                .iter()
                .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{field}: {detail}")
        })
        .collect::<Vec<_>>()
        .join("; ");
    TenantError::validation(message)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(custom(function = "tenant_rule"))]
    pub tenant: String,

    #[validate(length(min = 1, message = "version is required"))]
    pub version: String,

    #[validate(custom(function = "brand_rule"))]
    pub brand: String,

    #[validate(custom(function = "email_rule"))]
    pub email: String,

    #[validate(length(min = 1, message = "full_name is required"))]
    pub full_name: String,

    #[serde(default)]
    pub smtp_username: String,

    #[validate(length(min = 1, message = "smtp_host is required"))]
    pub smtp_host: String,

    #[validate(length(min = 1, message = "smtp_from is required"))]
    pub smtp_from: String,

    #[serde(deserialize_with = "smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_protocol")]
    pub smtp_protocol: String,

    /// Stored as given when present, generated otherwise
    #[serde(default)]
    pub smtp_password: Option<String>,
}

/// A create request that passed validation.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub tenant: TenantId,
    pub version: String,
    pub brand: String,
    pub email: String,
    pub full_name: String,
    pub smtp: SmtpSettings,
    pub smtp_password: Option<String>,
}

impl CreateTenantRequest {
    pub fn into_new_tenant(self) -> TenantResult<NewTenant> {
        self.validate().map_err(|e| flatten(&e))?;
        Ok(NewTenant {
            tenant: TenantId::parse(&self.tenant)?,
            version: self.version,
            brand: self.brand,
            email: self.email,
            full_name: self.full_name,
            smtp: SmtpSettings {
                username: self.smtp_username,
                host: self.smtp_host,
                from: self.smtp_from,
                port: self.smtp_port,
                protocol: self.smtp_protocol,
            },
            smtp_password: self.smtp_password,
        })
    }
}

/// Version is required; SMTP fields are only changed when supplied.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, message = "version is required"))]
    pub version: String,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "smtp_host must not be empty"))]
    pub smtp_host: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "smtp_from must not be empty"))]
    pub smtp_from: Option<String>,

    #[serde(default, deserialize_with = "optional_smtp_port")]
    pub smtp_port: Option<u16>,

    #[serde(default)]
    #[validate(length(min = 1, message = "smtp_protocol must not be empty"))]
    pub smtp_protocol: Option<String>,
}

impl UpdateTenantRequest {
    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn check(&self) -> TenantResult<()> {
        self.validate().map_err(|e| flatten(&e))
    }

    /// Stack parameters this request changes, besides TENANT and VERSION.
    pub fn smtp_overrides(&self) -> BTreeMap<String, String> {
        let mut overrides = BTreeMap::new();
        let fields = [
            ("SMTPUSERNAME", self.smtp_username.clone()),
            ("SMTPHOST", self.smtp_host.clone()),
            ("SMTPFROM", self.smtp_from.clone()),
            ("SMTPPORT", self.smtp_port.map(|p| p.to_string())),
            ("SMTPPROTOCOL", self.smtp_protocol.clone()),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value);
            }
        }
        overrides
    }
}
