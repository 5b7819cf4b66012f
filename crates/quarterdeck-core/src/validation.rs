//! Field-level validation for wizard input.
//!
//! All rules here are purely local: a failed validation re-prompts the same
//! field and never reaches the network layer.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::entity::TrafficLimitStrategy;
use crate::error::{ConsoleError, Result};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{6,34}$").expect("static regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9_]{1,16}$").expect("static regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static regex")
});
static COUNTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{2}$").expect("static regex"));

/// The fields a wizard can collect, across all entity kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FieldKind {
    Username,
    TrafficLimitBytes,
    TrafficLimitStrategy,
    ExpireAt,
    Description,
    TelegramId,
    Email,
    Tag,
    HwidDeviceLimit,
    Name,
    Address,
    Port,
    CountryCode,
    UsageCoefficient,
    Remark,
    Path,
    Sni,
}

impl FieldKind {
    /// Wire name used when the value is sent to the remote API.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::TrafficLimitBytes => "trafficLimitBytes",
            Self::TrafficLimitStrategy => "trafficLimitStrategy",
            Self::ExpireAt => "expireAt",
            Self::Description => "description",
            Self::TelegramId => "telegramId",
            Self::Email => "email",
            Self::Tag => "tag",
            Self::HwidDeviceLimit => "hwidDeviceLimit",
            Self::Name => "name",
            Self::Address => "address",
            Self::Port => "port",
            Self::CountryCode => "countryCode",
            Self::UsageCoefficient => "usageCoefficient",
            Self::Remark => "remark",
            Self::Path => "path",
            Self::Sni => "sni",
        }
    }

    /// Short prompt label for the rendering collaborator.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Username => "username (6-34 chars: letters, digits, '-', '_')",
            Self::TrafficLimitBytes => "traffic limit in bytes (0 = unlimited)",
            Self::TrafficLimitStrategy => "traffic reset strategy (NO_RESET, DAY, WEEK, MONTH)",
            Self::ExpireAt => "expiry date (YYYY-MM-DD)",
            Self::Description => "description",
            Self::TelegramId => "telegram id (integer)",
            Self::Email => "email address",
            Self::Tag => "tag (UPPERCASE letters, digits, '_', max 16)",
            Self::HwidDeviceLimit => "device limit (0 = unlimited)",
            Self::Name => "name",
            Self::Address => "address (host or IP)",
            Self::Port => "port (1-65535)",
            Self::CountryCode => "country code (2 letters)",
            Self::UsageCoefficient => "usage coefficient (> 0)",
            Self::Remark => "remark",
            Self::Path => "path (may be empty)",
            Self::Sni => "SNI (may be empty)",
        }
    }
}

/// A validated, typed field value ready to be placed in a request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Strategy(TrafficLimitStrategy),
    /// RFC3339-style timestamp string as the panel expects it.
    Timestamp(String),
}

impl FieldValue {
    /// JSON representation for request bodies.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Strategy(s) => serde_json::Value::String(s.to_string()),
            Self::Timestamp(t) => serde_json::Value::String(t.clone()),
        }
    }

    /// Display string for "keep template value" prompts.
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Strategy(s) => s.to_string(),
            Self::Timestamp(t) => t.clone(),
        }
    }
}

/// Validates raw operator input for one field.
///
/// Returns the typed value on success. The error message is user-facing and
/// names the constraint that was violated.
pub fn validate(kind: FieldKind, raw: &str) -> Result<FieldValue> {
    let raw = raw.trim();
    match kind {
        FieldKind::Username => {
            if USERNAME_RE.is_match(raw) {
                Ok(FieldValue::Text(raw.to_string()))
            } else {
                Err(ConsoleError::validation(
                    "username must be 6-34 characters: letters, digits, '-' or '_'",
                ))
            }
        }
        FieldKind::Tag => {
            if raw.is_empty() || TAG_RE.is_match(raw) {
                Ok(FieldValue::Text(raw.to_string()))
            } else {
                Err(ConsoleError::validation(
                    "tag must be UPPERCASE letters, digits or '_', at most 16 characters",
                ))
            }
        }
        FieldKind::Email => {
            if raw.is_empty() || EMAIL_RE.is_match(raw) {
                Ok(FieldValue::Text(raw.to_string()))
            } else {
                Err(ConsoleError::validation("not a valid email address"))
            }
        }
        FieldKind::ExpireAt => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ConsoleError::validation("date must be in YYYY-MM-DD format"))?;
            Ok(FieldValue::Timestamp(format!(
                "{}T00:00:00.000Z",
                date.format("%Y-%m-%d")
            )))
        }
        FieldKind::TrafficLimitBytes | FieldKind::HwidDeviceLimit => {
            let value: i64 = raw
                .parse()
                .map_err(|_| ConsoleError::validation("enter a whole number >= 0"))?;
            if value < 0 {
                return Err(ConsoleError::validation("enter a whole number >= 0"));
            }
            Ok(FieldValue::Integer(value))
        }
        FieldKind::TelegramId => {
            let value: i64 = raw
                .parse()
                .map_err(|_| ConsoleError::validation("telegram id must be an integer"))?;
            Ok(FieldValue::Integer(value))
        }
        FieldKind::TrafficLimitStrategy => {
            let strategy: TrafficLimitStrategy = raw.to_uppercase().parse().map_err(|_| {
                ConsoleError::validation("strategy must be one of NO_RESET, DAY, WEEK, MONTH")
            })?;
            Ok(FieldValue::Strategy(strategy))
        }
        FieldKind::Port => {
            let port: u32 = raw
                .parse()
                .map_err(|_| ConsoleError::validation("port must be a number from 1 to 65535"))?;
            if !(1..=65535).contains(&port) {
                return Err(ConsoleError::validation(
                    "port must be a number from 1 to 65535",
                ));
            }
            Ok(FieldValue::Integer(port as i64))
        }
        FieldKind::CountryCode => {
            if COUNTRY_RE.is_match(raw) {
                Ok(FieldValue::Text(raw.to_uppercase()))
            } else {
                Err(ConsoleError::validation("country code must be 2 letters"))
            }
        }
        FieldKind::UsageCoefficient => {
            let value: f64 = raw
                .parse()
                .map_err(|_| ConsoleError::validation("coefficient must be a number > 0"))?;
            if value <= 0.0 {
                return Err(ConsoleError::validation("coefficient must be a number > 0"));
            }
            Ok(FieldValue::Float(value))
        }
        FieldKind::Address | FieldKind::Name => {
            if raw.is_empty() {
                Err(ConsoleError::validation("value must not be empty"))
            } else {
                Ok(FieldValue::Text(raw.to_string()))
            }
        }
        FieldKind::Description | FieldKind::Remark | FieldKind::Path | FieldKind::Sni => {
            Ok(FieldValue::Text(raw.to_string()))
        }
    }
}
