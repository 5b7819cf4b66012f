//! Operator authorization.
//!
//! Checked at the top of every event, before any state is touched. The
//! engine only sees allow/deny; how the decision is made stays behind the
//! trait so tests can swap in their own policy.

use std::collections::HashSet;

/// Decides whether an operator may use the console at all.
pub trait Authorizer: Send + Sync {
    fn is_allowed(&self, operator_id: i64) -> bool;
}

/// Fixed allow-list loaded from configuration at startup.
pub struct StaticAllowList {
    ids: HashSet<i64>,
}

impl StaticAllowList {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl Authorizer for StaticAllowList {
    fn is_allowed(&self, operator_id: i64) -> bool {
        self.ids.contains(&operator_id)
    }
}
