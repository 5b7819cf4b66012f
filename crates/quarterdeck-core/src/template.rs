//! User creation templates.
//!
//! A template is a named, immutable bundle of default field values applied
//! when creating a user. Templates are static configuration and are never
//! mutated at runtime.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::TrafficLimitStrategy;

const GIB: u64 = 1024 * 1024 * 1024;

/// A named preset of user defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTemplate {
    pub name: String,
    pub description: String,
    pub traffic_limit_bytes: u64,
    pub hwid_device_limit: u32,
    pub traffic_limit_strategy: TrafficLimitStrategy,
    pub reset_day: u8,
}

impl UserTemplate {
    fn new(
        name: &str,
        description: &str,
        traffic_limit_bytes: u64,
        hwid_device_limit: u32,
        strategy: TrafficLimitStrategy,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            traffic_limit_bytes,
            hwid_device_limit,
            traffic_limit_strategy: strategy,
            reset_day: 1,
        }
    }

    /// Merges template defaults into a draft request body.
    ///
    /// Values already present in the draft are kept; the expiry date
    /// defaults to 30 days from now when absent.
    pub fn apply_to(&self, draft: &mut serde_json::Map<String, serde_json::Value>) {
        draft
            .entry("description".to_string())
            .or_insert_with(|| self.description.clone().into());
        draft
            .entry("trafficLimitBytes".to_string())
            .or_insert_with(|| self.traffic_limit_bytes.into());
        draft
            .entry("hwidDeviceLimit".to_string())
            .or_insert_with(|| self.hwid_device_limit.into());
        draft
            .entry("trafficLimitStrategy".to_string())
            .or_insert_with(|| self.traffic_limit_strategy.to_string().into());
        draft
            .entry("resetDay".to_string())
            .or_insert_with(|| self.reset_day.into());
        draft.entry("expireAt".to_string()).or_insert_with(|| {
            let expiry = Utc::now() + Duration::days(30);
            expiry.format("%Y-%m-%dT00:00:00.000Z").to_string().into()
        });
    }
}

/// The read-only set of templates shared by all sessions.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: Vec<UserTemplate>,
}

impl TemplateSet {
    /// The built-in tariff tiers.
    pub fn builtin() -> Self {
        use TrafficLimitStrategy::*;
        Self {
            templates: vec![
                UserTemplate::new("basic", "Basic VPN user", 100 * GIB, 1, Month),
                UserTemplate::new("standard", "Standard VPN user", 300 * GIB, 3, Month),
                UserTemplate::new("premium", "Premium VPN user", 800 * GIB, 5, Month),
                UserTemplate::new("family", "Family plan", 1536 * GIB, 10, Month),
                UserTemplate::new("corporate", "Corporate plan", 0, 0, NoReset),
                UserTemplate::new("trial", "Trial account", 10 * GIB, 1, Week),
                UserTemplate::new("vip", "VIP client", 0, 15, NoReset),
            ],
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&UserTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }
}
