//! Per-conversation session state.
//!
//! A `Session` exists per (operator, channel) pair and holds the wizard
//! state machine position plus transient working data: the field buffer of
//! the active wizard, the short-id page cache for the currently rendered
//! page, and any pending confirmation. Sessions are ephemeral UI state and
//! are never persisted across restarts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::entity::{CachedEntity, EntityKind, UserStatus};
use crate::validation::{FieldKind, FieldValue};

/// Search criteria supported by the user lookup endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum SearchCriterion {
    Username,
    TelegramId,
    Email,
    Tag,
}

/// An action awaiting operator confirmation.
///
/// At most one action is outstanding per session at any time; entering a
/// new wizard or menu clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PendingAction {
    Disable,
    Enable,
    ResetTraffic,
    RevokeSubscription,
    Restart,
    Delete,
    BulkResetAllTraffic,
    BulkDeleteByStatus(UserStatus),
}

impl PendingAction {
    /// Destructive actions require the typed-name confirmation protocol.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete | Self::BulkDeleteByStatus(_))
    }
}

/// Stage of the two-phase typed confirmation for destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmStage {
    /// Generic "are you sure" with cancel.
    AwaitYes,
    /// Operator must retype the entity's name exactly.
    AwaitName,
}

/// Whether a field-collection wizard ends in a create or an update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardPurpose {
    Create,
    Edit,
}

/// Position of a session in the conversation state machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum WizardState {
    #[default]
    Root,
    EntityMenu(EntityKind),
    ListSelect(EntityKind),
    SearchWait(EntityKind, SearchCriterion),
    FieldCollect {
        kind: EntityKind,
        purpose: WizardPurpose,
    },
    ConfirmSimple {
        kind: EntityKind,
        action: PendingAction,
    },
    ConfirmTyped {
        kind: EntityKind,
        stage: ConfirmStage,
    },
    Done,
}

/// Ordered field plan plus collected values for the active wizard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBuffer {
    fields: Vec<FieldKind>,
    index: usize,
    values: HashMap<FieldKind, FieldValue>,
    template: Option<String>,
}

impl FieldBuffer {
    /// Starts a new buffer over the given field plan.
    pub fn start(fields: Vec<FieldKind>, template: Option<String>) -> Self {
        Self {
            fields,
            index: 0,
            values: HashMap::new(),
            template,
        }
    }

    /// Pre-fills a value (from a template) without advancing.
    pub fn prefill(&mut self, kind: FieldKind, value: FieldValue) {
        self.values.insert(kind, value);
    }

    /// The field currently being collected, if any remain.
    pub fn current(&self) -> Option<FieldKind> {
        self.fields.get(self.index).copied()
    }

    /// Stores a validated value for the current field and advances.
    pub fn accept(&mut self, value: FieldValue) {
        if let Some(kind) = self.current() {
            self.values.insert(kind, value);
            self.index += 1;
        }
    }

    /// Advances without storing (skip, or keep the pre-filled value).
    pub fn advance(&mut self) {
        if self.index < self.fields.len() {
            self.index += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.fields.len()
    }

    /// Fields still to be visited, the current one included.
    pub fn remaining(&self) -> usize {
        self.fields.len().saturating_sub(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn value(&self, kind: FieldKind) -> Option<&FieldValue> {
        self.values.get(&kind)
    }

    pub fn values(&self) -> &HashMap<FieldKind, FieldValue> {
        &self.values
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.index = 0;
        self.values.clear();
        self.template = None;
    }
}

/// Mutable state for one (operator, channel) conversation.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: WizardState,
    pub buffer: FieldBuffer,
    pub active_entity: Option<Uuid>,
    pub active_name: Option<String>,
    pub pending_action: Option<PendingAction>,
    pub confirmation_target: Option<String>,
    page_cache: HashMap<String, CachedEntity>,
    page_order: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn set_state(&mut self, state: WizardState) {
        self.state = state;
    }

    /// Returns to the root state discarding all wizard data. Used on
    /// cancellation, completion and unauthorized access.
    pub fn reset_to_root(&mut self) {
        self.set_state(WizardState::Root);
        self.buffer.clear();
        self.active_entity = None;
        self.active_name = None;
        self.pending_action = None;
        self.confirmation_target = None;
        self.page_cache.clear();
        self.page_order.clear();
    }

    /// Enters the menu for an entity kind, clearing any wizard leftovers.
    pub fn enter_menu(&mut self, kind: EntityKind) {
        self.set_state(WizardState::EntityMenu(kind));
        self.buffer.clear();
        self.pending_action = None;
        self.confirmation_target = None;
    }

    /// Starts a field-collection wizard. Clears the buffer and any pending
    /// action first (at most one outstanding flow per session).
    pub fn begin_wizard(
        &mut self,
        kind: EntityKind,
        purpose: WizardPurpose,
        fields: Vec<FieldKind>,
        template: Option<String>,
    ) {
        self.pending_action = None;
        self.confirmation_target = None;
        self.buffer = FieldBuffer::start(fields, template);
        self.set_state(WizardState::FieldCollect { kind, purpose });
    }

    /// Replaces the page cache with the given snapshots, keyed by 1-based
    /// ordinal short ids. The mapping is valid only for the lifetime of the
    /// currently rendered page.
    pub fn cache_page(&mut self, items: Vec<CachedEntity>) {
        self.page_cache.clear();
        self.page_order.clear();
        for (i, item) in items.into_iter().enumerate() {
            let short_id = (i + 1).to_string();
            self.page_order.push(short_id.clone());
            self.page_cache.insert(short_id, item);
        }
    }

    /// Looks up an entity from the rendered page. Unknown ids fail closed
    /// as "not cached" rather than an error.
    pub fn cached(&self, short_id: &str) -> Option<&CachedEntity> {
        self.page_cache.get(short_id)
    }

    /// Snapshots in rendered order, with their short ids.
    pub fn page(&self) -> Vec<(String, CachedEntity)> {
        self.page_order
            .iter()
            .filter_map(|id| {
                self.page_cache
                    .get(id)
                    .map(|e| (id.clone(), e.clone()))
            })
            .collect()
    }
}
