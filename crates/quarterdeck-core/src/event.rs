//! Operator events and render payloads.
//!
//! Events arrive already decoded into a closed enum; the transport layer
//! (bot framework, CLI, tests) is responsible for mapping its own callback
//! strings or keystrokes into these variants exactly once, at the boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{CachedEntity, EntityKind};
use crate::session::{PendingAction, SearchCriterion, WizardState};
use crate::validation::FieldKind;

/// A typed menu selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MenuChoice {
    /// Pick an entity kind from the root menu.
    Kind(EntityKind),
    /// List the current kind's entities.
    List,
    /// Begin a search flow for the given criterion.
    Search(SearchCriterion),
    /// Begin a create wizard.
    Create,
    /// Use a named template for the create wizard.
    Template(String),
    /// Create without a template, collecting every field.
    Manual,
    /// Keep the template-provided value for the current field.
    KeepTemplateValue,
    /// Skip the current field (a default applies).
    Skip,
    /// Pick an entity from the rendered page by short id.
    Pick(String),
    /// Jump to another page of the current listing (1-based).
    Page(usize),
    /// Edit a single field of the selected entity.
    EditField(FieldKind),
    /// Request an action on the selected entity (or a bulk action).
    Action(PendingAction),
    /// Show panel-wide statistics.
    Stats,
    /// Go up one level.
    Back,
}

/// An inbound operator event, tagged with nothing: session identity travels
/// separately as the store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatorEvent {
    Menu(MenuChoice),
    Text(String),
    Confirm(bool),
    Cancel,
}

/// Compact entity description for list and detail rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub uuid: Uuid,
    pub name: String,
    pub detail: String,
}

impl From<&CachedEntity> for EntitySummary {
    fn from(entity: &CachedEntity) -> Self {
        let detail = match entity {
            CachedEntity::User(u) => format!(
                "{} | used {} of {} bytes",
                u.status, u.used_traffic_bytes, u.traffic_limit_bytes
            ),
            CachedEntity::Node(n) => format!(
                "{} | {}",
                n.address,
                if n.is_disabled {
                    "disabled"
                } else if n.is_connected {
                    "connected"
                } else {
                    "disconnected"
                }
            ),
            CachedEntity::Host(h) => format!(
                "{}:{}",
                h.address,
                h.port.map(|p| p.to_string()).unwrap_or_default()
            ),
            CachedEntity::Inbound(i) => format!(
                "{} :{}",
                i.kind.clone().unwrap_or_default(),
                i.port.map(|p| p.to_string()).unwrap_or_default()
            ),
            CachedEntity::ConfigProfile(p) => format!("{} inbound(s)", p.inbounds.len()),
        };
        Self {
            uuid: entity.uuid(),
            name: entity.display_name().to_string(),
            detail,
        }
    }
}

/// Structured data for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum View {
    /// Root menu with the available entity kinds.
    MainMenu,
    /// Authorization denied; session was reset.
    Denied,
    /// Menu for one entity kind, optionally with a selected entity.
    EntityMenu {
        kind: EntityKind,
        selected: Option<EntitySummary>,
    },
    /// One page of entities keyed by short id.
    EntityPage {
        kind: EntityKind,
        items: Vec<(String, EntitySummary)>,
        page: usize,
        total_pages: usize,
    },
    /// Waiting for a free-text search query.
    SearchPrompt {
        kind: EntityKind,
        criterion: SearchCriterion,
    },
    /// Waiting for a field value.
    FieldPrompt {
        field: FieldKind,
        label: String,
        /// Present when a template pre-filled this field; the operator may
        /// keep it with one click instead of retyping.
        template_value: Option<String>,
        /// Validation or repository failure to show above the prompt.
        notice: Option<String>,
    },
    /// Single-step confirmation for a reversible action.
    ConfirmAction {
        action: PendingAction,
        target: String,
    },
    /// Typed-name confirmation for a destructive action.
    TypedPrompt { target: String },
    /// An entity was created; its id is available for immediate view.
    Created {
        kind: EntityKind,
        summary: EntitySummary,
    },
    /// Informational outcome (action applied, nothing found, ...).
    Notice(String),
    /// A failure surfaced to the operator. State did not advance.
    Error(String),
}

/// What the state machine hands back for every processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPayload {
    pub state: WizardState,
    pub view: View,
}

impl RenderPayload {
    pub fn new(state: WizardState, view: View) -> Self {
        Self { state, view }
    }
}
