//! Typed read models for the managed entities.
//!
//! Entities are decoded once at the gateway boundary and handed to the rest
//! of the core as plain structs. The core only ever holds transient read
//! copies; all mutations round-trip through the remote API.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// The entity kinds the console manages.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum EntityKind {
    User,
    Node,
    Host,
    Inbound,
    ConfigProfile,
}

impl EntityKind {
    /// Static name used in error messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Node => "node",
            Self::Host => "host",
            Self::Inbound => "inbound",
            Self::ConfigProfile => "config profile",
        }
    }
}

/// Traffic reset strategy for a user account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficLimitStrategy {
    #[default]
    #[serde(rename = "NO_RESET")]
    NoReset,
    #[serde(rename = "DAY")]
    Day,
    #[serde(rename = "WEEK")]
    Week,
    #[serde(rename = "MONTH")]
    Month,
}

/// Account status as reported by the panel. Unknown values decode to
/// `Unknown` rather than failing the whole page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
pub enum UserStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "LIMITED")]
    Limited,
    #[serde(rename = "EXPIRED")]
    Expired,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A managed user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uuid: Uuid,
    pub username: String,
    #[serde(default)]
    pub short_uuid: Option<String>,
    #[serde(default)]
    pub subscription_uuid: Option<String>,
    #[serde(default)]
    pub subscription_url: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub used_traffic_bytes: u64,
    #[serde(default)]
    pub traffic_limit_bytes: u64,
    #[serde(default)]
    pub traffic_limit_strategy: TrafficLimitStrategy,
    #[serde(default)]
    pub expire_at: Option<String>,
    #[serde(default)]
    pub hwid_device_limit: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub telegram_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A server node running panel workloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub uuid: Uuid,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub usage_coefficient: Option<f64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub last_connected_at: Option<String>,
}

/// Inbound binding of a host (panel v2 shape: profile + profile inbound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostInboundRef {
    #[serde(default)]
    pub config_profile_uuid: Option<Uuid>,
    #[serde(default)]
    pub config_profile_inbound_uuid: Option<Uuid>,
}

/// A connection host exposed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub uuid: Uuid,
    #[serde(default)]
    pub remark: String,
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sni: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub alpn: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub security_layer: Option<String>,
    #[serde(default)]
    pub inbound: HostInboundRef,
}

/// A traffic inbound as exposed through config profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub uuid: Uuid,
    pub tag: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub security: Option<String>,
}

/// A named configuration profile grouping inbounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProfile {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub inbounds: Vec<Inbound>,
}

/// One cached entity snapshot, keyed by short id in the page cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedEntity {
    User(User),
    Node(Node),
    Host(Host),
    Inbound(Inbound),
    ConfigProfile(ConfigProfile),
}

impl CachedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Node(_) => EntityKind::Node,
            Self::Host(_) => EntityKind::Host,
            Self::Inbound(_) => EntityKind::Inbound,
            Self::ConfigProfile(_) => EntityKind::ConfigProfile,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Self::User(u) => u.uuid,
            Self::Node(n) => n.uuid,
            Self::Host(h) => h.uuid,
            Self::Inbound(i) => i.uuid,
            Self::ConfigProfile(p) => p.uuid,
        }
    }

    /// Human-readable name; this is the string the typed delete
    /// confirmation matches against.
    pub fn display_name(&self) -> &str {
        match self {
            Self::User(u) => &u.username,
            Self::Node(n) => &n.name,
            Self::Host(h) => {
                if h.remark.is_empty() {
                    &h.address
                } else {
                    &h.remark
                }
            }
            Self::Inbound(i) => &i.tag,
            Self::ConfigProfile(p) => &p.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_decodes_from_camel_case() {
        let raw = serde_json::json!({
            "uuid": "f3b9f0a2-7c2a-4df2-9d25-5a6f2a9d0c11",
            "username": "bob_01",
            "status": "ACTIVE",
            "usedTrafficBytes": 42,
            "trafficLimitBytes": 1024,
            "trafficLimitStrategy": "MONTH",
            "hwidDeviceLimit": 3
        });
        let user: User = serde_json::from_value(raw).unwrap();
        assert_eq!(user.username, "bob_01");
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.traffic_limit_strategy, TrafficLimitStrategy::Month);
        assert_eq!(user.hwid_device_limit, Some(3));
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let raw = serde_json::json!({
            "uuid": "f3b9f0a2-7c2a-4df2-9d25-5a6f2a9d0c11",
            "username": "bob_01",
            "status": "FROZEN"
        });
        let user: User = serde_json::from_value(raw).unwrap();
        assert_eq!(user.status, UserStatus::Unknown);
    }

    #[test]
    fn host_display_name_falls_back_to_address() {
        let host = Host {
            uuid: Uuid::new_v4(),
            remark: String::new(),
            address: "10.0.0.1".into(),
            port: Some(443),
            path: None,
            sni: None,
            host: None,
            alpn: None,
            fingerprint: None,
            is_disabled: false,
            security_layer: None,
            inbound: HostInboundRef::default(),
        };
        assert_eq!(CachedEntity::Host(host).display_name(), "10.0.0.1");
    }
}
