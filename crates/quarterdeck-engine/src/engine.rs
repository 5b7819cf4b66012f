//! The wizard state machine.
//!
//! `handle_event` is the single entry point: authorization is checked
//! before anything else, cancellation short-circuits from any depth, and
//! the remaining transitions are keyed on (current state, event). The
//! invariant throughout is that a failed repository call leaves the
//! session exactly where it was before the call.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use quarterdeck_core::entity::{CachedEntity, EntityKind, User};
use quarterdeck_core::error::{ConsoleError, Result};
use quarterdeck_core::event::{EntitySummary, MenuChoice, OperatorEvent, RenderPayload, View};
use quarterdeck_core::guard::{confirm_typed, ConfirmOutcome};
use quarterdeck_core::session::{
    ConfirmStage, FieldBuffer, PendingAction, SearchCriterion, Session, WizardPurpose, WizardState,
};
use quarterdeck_core::template::TemplateSet;
use quarterdeck_core::validation::{self, FieldKind, FieldValue};
use quarterdeck_gateway::Repositories;

use crate::auth::Authorizer;
use crate::store::{SessionKey, SessionStore};

fn manual_user_plan() -> Vec<FieldKind> {
    vec![
        FieldKind::Username,
        FieldKind::TrafficLimitBytes,
        FieldKind::TrafficLimitStrategy,
        FieldKind::ExpireAt,
        FieldKind::Description,
        FieldKind::TelegramId,
        FieldKind::Email,
        FieldKind::Tag,
        FieldKind::HwidDeviceLimit,
    ]
}

/// Template wizards still visit the pre-filled fields so the operator can
/// keep or override each value.
fn template_user_plan() -> Vec<FieldKind> {
    vec![
        FieldKind::Username,
        FieldKind::TrafficLimitBytes,
        FieldKind::HwidDeviceLimit,
        FieldKind::TrafficLimitStrategy,
        FieldKind::ExpireAt,
    ]
}

fn node_plan() -> Vec<FieldKind> {
    vec![
        FieldKind::Name,
        FieldKind::Address,
        FieldKind::Port,
        FieldKind::CountryCode,
        FieldKind::UsageCoefficient,
    ]
}

fn host_plan() -> Vec<FieldKind> {
    vec![
        FieldKind::Remark,
        FieldKind::Address,
        FieldKind::Port,
        FieldKind::Path,
        FieldKind::Sni,
    ]
}

fn wire_payload(buffer: &FieldBuffer) -> serde_json::Map<String, Value> {
    buffer
        .values()
        .iter()
        .map(|(kind, value)| (kind.wire_name().to_string(), value.to_json()))
        .collect()
}

fn default_expire_at() -> String {
    (Utc::now() + chrono::Duration::days(30))
        .format("%Y-%m-%dT00:00:00.000Z")
        .to_string()
}

fn format_stats(stats: &Value) -> String {
    let users = stats.pointer("/users/totalUsers").and_then(Value::as_u64);
    let online = stats.pointer("/onlineStats/onlineNow").and_then(Value::as_u64);
    match (users, online) {
        (Some(users), Some(online)) => format!("{users} users total, {online} online now"),
        _ => stats.to_string(),
    }
}

fn random_username() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

/// Drives all sessions. Shared and immutable; per-session mutability lives
/// inside the store.
pub struct WizardEngine {
    repos: Repositories,
    store: SessionStore,
    auth: Arc<dyn Authorizer>,
    templates: TemplateSet,
    page_size: usize,
}

impl WizardEngine {
    pub fn new(
        repos: Repositories,
        auth: Arc<dyn Authorizer>,
        templates: TemplateSet,
        page_size: usize,
    ) -> Self {
        Self {
            repos,
            store: SessionStore::new(),
            auth,
            templates,
            page_size: page_size.max(1),
        }
    }

    /// Processes one operator event to completion, network round trips
    /// included. The session lock is held throughout, so each session
    /// handles events strictly one at a time.
    pub async fn handle_event(&self, key: SessionKey, event: OperatorEvent) -> RenderPayload {
        let session = self.store.get_or_create(key).await;
        let mut session = session.lock().await;

        if !self.auth.is_allowed(key.operator_id) {
            tracing::warn!(operator = key.operator_id, "denied unauthorized operator");
            session.reset_to_root();
            return RenderPayload::new(WizardState::Root, View::Denied);
        }

        if matches!(event, OperatorEvent::Cancel) {
            session.reset_to_root();
            return RenderPayload::new(WizardState::Root, View::MainMenu);
        }

        let state = session.state().clone();
        match state {
            WizardState::Root | WizardState::Done => self.on_root(&mut session, event).await,
            WizardState::EntityMenu(kind) => self.on_entity_menu(&mut session, kind, event).await,
            WizardState::ListSelect(kind) => self.on_list_select(&mut session, kind, event).await,
            WizardState::SearchWait(kind, criterion) => {
                self.on_search_wait(&mut session, kind, criterion, event).await
            }
            WizardState::FieldCollect { kind, purpose } => {
                self.on_field_collect(&mut session, kind, purpose, event).await
            }
            WizardState::ConfirmSimple { kind, action } => {
                self.on_confirm_simple(&mut session, kind, action, event).await
            }
            WizardState::ConfirmTyped { kind, stage } => {
                self.on_confirm_typed(&mut session, kind, stage, event).await
            }
        }
    }

    fn payload(&self, session: &Session, view: View) -> RenderPayload {
        RenderPayload::new(session.state().clone(), view)
    }

    fn selected_summary(session: &Session) -> Option<EntitySummary> {
        match (session.active_entity, &session.active_name) {
            (Some(uuid), Some(name)) => Some(EntitySummary {
                uuid,
                name: name.clone(),
                detail: String::new(),
            }),
            _ => None,
        }
    }

    async fn on_root(&self, session: &mut Session, event: OperatorEvent) -> RenderPayload {
        match event {
            OperatorEvent::Menu(MenuChoice::Kind(kind)) => {
                session.enter_menu(kind);
                self.payload(session, View::EntityMenu {
                    kind,
                    selected: None,
                })
            }
            OperatorEvent::Menu(MenuChoice::Stats) => match self.repos.system.stats().await {
                Ok(stats) => self.payload(session, View::Notice(format_stats(&stats))),
                Err(err) => self.payload(session, View::Error(err.to_string())),
            },
            _ => self.payload(session, View::MainMenu),
        }
    }

    async fn on_entity_menu(
        &self,
        session: &mut Session,
        kind: EntityKind,
        event: OperatorEvent,
    ) -> RenderPayload {
        match event {
            OperatorEvent::Menu(MenuChoice::Kind(other)) => {
                // A selection never carries across entity kinds.
                session.active_entity = None;
                session.active_name = None;
                session.enter_menu(other);
                self.payload(session, View::EntityMenu {
                    kind: other,
                    selected: None,
                })
            }
            OperatorEvent::Menu(MenuChoice::List) => self.show_page(session, kind, 1).await,
            OperatorEvent::Menu(MenuChoice::Page(page)) => self.show_page(session, kind, page).await,
            OperatorEvent::Menu(MenuChoice::Search(criterion)) => {
                if kind != EntityKind::User {
                    return self.payload(
                        session,
                        View::Notice("search is only available for users".to_string()),
                    );
                }
                session.set_state(WizardState::SearchWait(kind, criterion));
                self.payload(session, View::SearchPrompt { kind, criterion })
            }
            OperatorEvent::Menu(MenuChoice::Create) => match kind {
                EntityKind::User => self.payload(
                    session,
                    View::Notice(format!(
                        "choose a template ({}) or manual entry",
                        self.templates.names().join(", ")
                    )),
                ),
                EntityKind::Node => {
                    session.begin_wizard(kind, WizardPurpose::Create, node_plan(), None);
                    self.prompt_current(session, None)
                }
                EntityKind::Host => {
                    session.begin_wizard(kind, WizardPurpose::Create, host_plan(), None);
                    self.prompt_current(session, None)
                }
                _ => self.payload(
                    session,
                    View::Notice(format!(
                        "{}s cannot be created from the console",
                        kind.label()
                    )),
                ),
            },
            OperatorEvent::Menu(MenuChoice::Template(name)) if kind == EntityKind::User => {
                self.start_template_wizard(session, &name)
            }
            OperatorEvent::Menu(MenuChoice::Manual) if kind == EntityKind::User => {
                session.begin_wizard(kind, WizardPurpose::Create, manual_user_plan(), None);
                self.prompt_current(session, None)
            }
            OperatorEvent::Menu(MenuChoice::EditField(field)) => {
                if session.active_entity.is_none() {
                    return self.payload(session, View::Error("select an entity first".to_string()));
                }
                if !matches!(kind, EntityKind::User | EntityKind::Node | EntityKind::Host) {
                    return self.payload(
                        session,
                        View::Notice(format!("{}s cannot be edited here", kind.label())),
                    );
                }
                session.begin_wizard(kind, WizardPurpose::Edit, vec![field], None);
                self.prompt_current(session, None)
            }
            OperatorEvent::Menu(MenuChoice::Action(action)) => {
                self.request_action(session, kind, action)
            }
            OperatorEvent::Menu(MenuChoice::Back) => {
                session.reset_to_root();
                self.payload(session, View::MainMenu)
            }
            _ => self.payload(session, View::EntityMenu {
                kind,
                selected: Self::selected_summary(session),
            }),
        }
    }

    fn start_template_wizard(&self, session: &mut Session, name: &str) -> RenderPayload {
        let Some(template) = self.templates.get(name) else {
            return self.payload(session, View::Error(format!("unknown template '{name}'")));
        };
        let traffic = template.traffic_limit_bytes as i64;
        let hwid = template.hwid_device_limit as i64;
        let strategy = template.traffic_limit_strategy;

        session.begin_wizard(
            EntityKind::User,
            WizardPurpose::Create,
            template_user_plan(),
            Some(name.to_string()),
        );
        session
            .buffer
            .prefill(FieldKind::TrafficLimitBytes, FieldValue::Integer(traffic));
        session
            .buffer
            .prefill(FieldKind::HwidDeviceLimit, FieldValue::Integer(hwid));
        session
            .buffer
            .prefill(FieldKind::TrafficLimitStrategy, FieldValue::Strategy(strategy));
        self.prompt_current(session, None)
    }

    fn action_supported(kind: EntityKind, action: PendingAction) -> bool {
        use PendingAction::*;
        match action {
            Disable | Enable => {
                matches!(kind, EntityKind::User | EntityKind::Node | EntityKind::Host)
            }
            ResetTraffic | RevokeSubscription => kind == EntityKind::User,
            Restart => kind == EntityKind::Node,
            Delete => !matches!(kind, EntityKind::Inbound),
            BulkResetAllTraffic | BulkDeleteByStatus(_) => kind == EntityKind::User,
        }
    }

    fn request_action(
        &self,
        session: &mut Session,
        kind: EntityKind,
        action: PendingAction,
    ) -> RenderPayload {
        if !Self::action_supported(kind, action) {
            return self.payload(
                session,
                View::Notice(format!("{action} is not available for {}s", kind.label())),
            );
        }
        let target = match action {
            PendingAction::BulkResetAllTraffic => "all users".to_string(),
            PendingAction::BulkDeleteByStatus(status) => status.to_string(),
            _ => match &session.active_name {
                Some(name) => name.clone(),
                None => {
                    return self
                        .payload(session, View::Error("select an entity first".to_string()))
                }
            },
        };

        session.pending_action = Some(action);
        if action.is_destructive() {
            session.confirmation_target = Some(target.clone());
            session.set_state(WizardState::ConfirmTyped {
                kind,
                stage: ConfirmStage::AwaitYes,
            });
        } else {
            session.set_state(WizardState::ConfirmSimple { kind, action });
        }
        self.payload(session, View::ConfirmAction { action, target })
    }

    async fn fetch_kind(&self, kind: EntityKind) -> Result<Vec<CachedEntity>> {
        Ok(match kind {
            EntityKind::User => self
                .repos
                .users
                .list()
                .await?
                .into_iter()
                .map(CachedEntity::User)
                .collect(),
            EntityKind::Node => self
                .repos
                .nodes
                .list()
                .await?
                .into_iter()
                .map(CachedEntity::Node)
                .collect(),
            EntityKind::Host => self
                .repos
                .hosts
                .list()
                .await?
                .into_iter()
                .map(CachedEntity::Host)
                .collect(),
            EntityKind::Inbound => self
                .repos
                .inbounds
                .list()
                .await?
                .into_iter()
                .map(CachedEntity::Inbound)
                .collect(),
            EntityKind::ConfigProfile => self
                .repos
                .config_profiles
                .list()
                .await?
                .into_iter()
                .map(CachedEntity::ConfigProfile)
                .collect(),
        })
    }

    fn page_view(session: &Session, kind: EntityKind, page: usize, total_pages: usize) -> View {
        let items = session
            .page()
            .iter()
            .map(|(id, entity)| (id.clone(), EntitySummary::from(entity)))
            .collect();
        View::EntityPage {
            kind,
            items,
            page,
            total_pages,
        }
    }

    /// Fetches the full listing, caches one page of it under fresh short
    /// ids and moves the session into list-select.
    async fn show_page(
        &self,
        session: &mut Session,
        kind: EntityKind,
        page: usize,
    ) -> RenderPayload {
        let all = match self.fetch_kind(kind).await {
            Ok(all) => all,
            // State holds; the operator can simply retry the listing.
            Err(err) => return self.payload(session, View::Error(err.to_string())),
        };
        if all.is_empty() {
            session.set_state(WizardState::EntityMenu(kind));
            return self.payload(session, View::Notice(format!("no {}s found", kind.label())));
        }

        let total_pages = (all.len() + self.page_size - 1) / self.page_size;
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(all.len());
        session.cache_page(all[start..end].to_vec());
        session.set_state(WizardState::ListSelect(kind));
        self.payload(session, Self::page_view(session, kind, page, total_pages))
    }

    async fn on_list_select(
        &self,
        session: &mut Session,
        kind: EntityKind,
        event: OperatorEvent,
    ) -> RenderPayload {
        match event {
            OperatorEvent::Menu(MenuChoice::Pick(short_id)) => {
                // Fails closed: an id not on the rendered page is a miss,
                // never a session fault.
                let Some(entity) = session.cached(&short_id).cloned() else {
                    return self.payload(
                        session,
                        View::Notice(format!("'{short_id}' is not on the current page")),
                    );
                };
                let summary = EntitySummary::from(&entity);
                session.active_entity = Some(entity.uuid());
                session.active_name = Some(entity.display_name().to_string());
                session.set_state(WizardState::EntityMenu(kind));
                self.payload(session, View::EntityMenu {
                    kind,
                    selected: Some(summary),
                })
            }
            OperatorEvent::Menu(MenuChoice::Page(page)) => self.show_page(session, kind, page).await,
            OperatorEvent::Menu(MenuChoice::List) => self.show_page(session, kind, 1).await,
            OperatorEvent::Menu(MenuChoice::Back) => {
                session.set_state(WizardState::EntityMenu(kind));
                self.payload(session, View::EntityMenu {
                    kind,
                    selected: Self::selected_summary(session),
                })
            }
            _ => self.payload(session, View::Error("pick an entry by its number".to_string())),
        }
    }

    async fn on_search_wait(
        &self,
        session: &mut Session,
        kind: EntityKind,
        criterion: SearchCriterion,
        event: OperatorEvent,
    ) -> RenderPayload {
        let OperatorEvent::Text(query) = event else {
            return self.payload(session, View::SearchPrompt { kind, criterion });
        };
        let query = query.trim().to_string();

        match self.repos.users.find(criterion, &query).await {
            Ok(users) if users.is_empty() => {
                session.set_state(WizardState::EntityMenu(kind));
                self.payload(
                    session,
                    View::Notice(format!("no user matches {criterion} '{query}'")),
                )
            }
            Ok(users) => {
                let found: Vec<CachedEntity> = users.into_iter().map(CachedEntity::User).collect();
                session.cache_page(found);
                session.set_state(WizardState::ListSelect(kind));
                self.payload(session, Self::page_view(session, kind, 1, 1))
            }
            // State holds in SearchWait; the operator can resubmit the query.
            Err(err) => self.payload(session, View::Error(err.to_string())),
        }
    }

    async fn on_field_collect(
        &self,
        session: &mut Session,
        kind: EntityKind,
        purpose: WizardPurpose,
        event: OperatorEvent,
    ) -> RenderPayload {
        let Some(field) = session.buffer.current() else {
            session.set_state(WizardState::EntityMenu(kind));
            return self.payload(session, View::Error("nothing left to collect".to_string()));
        };

        match event {
            OperatorEvent::Text(raw) => match validation::validate(field, &raw) {
                Ok(value) => self.submit_field(session, kind, purpose, field, Some(value)).await,
                // Validation failures never advance; the same field is
                // re-prompted with the constraint that was violated.
                Err(err) => self.prompt_current(session, Some(err.to_string())),
            },
            OperatorEvent::Menu(MenuChoice::KeepTemplateValue) => {
                if session.buffer.value(field).is_none() {
                    return self
                        .prompt_current(session, Some("no template value for this field".to_string()));
                }
                self.submit_field(session, kind, purpose, field, None).await
            }
            OperatorEvent::Menu(MenuChoice::Skip) => {
                self.submit_field(session, kind, purpose, field, None).await
            }
            OperatorEvent::Menu(MenuChoice::Back) => {
                session.buffer.clear();
                session.set_state(WizardState::EntityMenu(kind));
                self.payload(session, View::EntityMenu {
                    kind,
                    selected: Self::selected_summary(session),
                })
            }
            _ => self.prompt_current(session, None),
        }
    }

    /// Stores a value for the current field and advances, except on the
    /// final field where the repository call must succeed first.
    async fn submit_field(
        &self,
        session: &mut Session,
        kind: EntityKind,
        purpose: WizardPurpose,
        field: FieldKind,
        value: Option<FieldValue>,
    ) -> RenderPayload {
        if let Some(value) = value {
            session.buffer.prefill(field, value);
        }

        if session.buffer.remaining() <= 1 {
            match self.finish(session, kind, purpose).await {
                Ok(payload) => payload,
                // Collected values stay put; resubmitting is always safe.
                Err(err) => self.prompt_current(session, Some(err.to_string())),
            }
        } else {
            session.buffer.advance();
            self.prompt_current(session, None)
        }
    }

    fn prompt_current(&self, session: &Session, notice: Option<String>) -> RenderPayload {
        let view = match session.buffer.current() {
            Some(field) => View::FieldPrompt {
                field,
                label: field.label().to_string(),
                template_value: session.buffer.value(field).map(|v| v.display()),
                notice,
            },
            None => View::Error("nothing left to collect".to_string()),
        };
        self.payload(session, view)
    }

    async fn finish(
        &self,
        session: &mut Session,
        kind: EntityKind,
        purpose: WizardPurpose,
    ) -> Result<RenderPayload> {
        match purpose {
            WizardPurpose::Create => {
                let entity = match kind {
                    EntityKind::User => CachedEntity::User(self.create_user(session).await?),
                    EntityKind::Node => {
                        let payload = Value::Object(wire_payload(&session.buffer));
                        CachedEntity::Node(self.repos.nodes.create(payload).await?)
                    }
                    EntityKind::Host => {
                        let payload = Value::Object(wire_payload(&session.buffer));
                        CachedEntity::Host(self.repos.hosts.create(payload).await?)
                    }
                    _ => {
                        return Err(ConsoleError::validation(format!(
                            "{}s cannot be created from the console",
                            kind.label()
                        )))
                    }
                };
                let summary = EntitySummary::from(&entity);
                let uuid = entity.uuid();
                let name = entity.display_name().to_string();
                tracing::info!(kind = kind.label(), %uuid, "entity created");

                session.reset_to_root();
                session.active_entity = Some(uuid);
                session.active_name = Some(name);
                Ok(self.payload(session, View::Created { kind, summary }))
            }
            WizardPurpose::Edit => {
                let uuid = session
                    .active_entity
                    .ok_or_else(|| ConsoleError::internal("no entity selected for edit"))?;
                let mut changes = wire_payload(&session.buffer);
                match kind {
                    EntityKind::User => {
                        // Device limits only work with a non-resetting strategy.
                        let hwid = changes
                            .get("hwidDeviceLimit")
                            .and_then(Value::as_u64)
                            .unwrap_or(0);
                        if hwid > 0 {
                            changes.insert(
                                "trafficLimitStrategy".to_string(),
                                Value::from("NO_RESET"),
                            );
                        }
                        self.repos.users.update(uuid, changes).await?;
                    }
                    EntityKind::Node => {
                        self.repos.nodes.update(uuid, changes).await?;
                    }
                    EntityKind::Host => {
                        self.repos.hosts.update(uuid, changes).await?;
                    }
                    _ => {
                        return Err(ConsoleError::validation(format!(
                            "{}s cannot be edited here",
                            kind.label()
                        )))
                    }
                }
                session.buffer.clear();
                session.set_state(WizardState::EntityMenu(kind));
                Ok(self.payload(session, View::Notice(format!("{} updated", kind.label()))))
            }
        }
    }

    async fn create_user(&self, session: &Session) -> Result<User> {
        let mut payload = wire_payload(&session.buffer);
        if let Some(name) = session.buffer.template() {
            let template = self
                .templates
                .get(name)
                .ok_or_else(|| ConsoleError::validation(format!("unknown template '{name}'")))?;
            template.apply_to(&mut payload);
        }
        payload
            .entry("expireAt".to_string())
            .or_insert_with(|| default_expire_at().into());
        let hwid = payload
            .get("hwidDeviceLimit")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if hwid > 0 {
            // Device limits only work with a non-resetting strategy.
            payload.insert("trafficLimitStrategy".to_string(), Value::from("NO_RESET"));
        }
        if !payload.contains_key("username") {
            payload.insert("username".to_string(), Value::from(random_username()));
        }
        self.repos.users.create(Value::Object(payload)).await
    }

    async fn on_confirm_simple(
        &self,
        session: &mut Session,
        kind: EntityKind,
        action: PendingAction,
        event: OperatorEvent,
    ) -> RenderPayload {
        match event {
            OperatorEvent::Confirm(true) => {
                session.pending_action = None;
                let result = self.perform_action(session, kind, action).await;
                session.set_state(WizardState::EntityMenu(kind));
                match result {
                    Ok(notice) => self.payload(session, View::Notice(notice)),
                    Err(err) => self.payload(session, View::Error(err.to_string())),
                }
            }
            OperatorEvent::Confirm(false) => {
                session.pending_action = None;
                session.set_state(WizardState::EntityMenu(kind));
                self.payload(session, View::Notice("action cancelled".to_string()))
            }
            _ => {
                let target = session
                    .active_name
                    .clone()
                    .unwrap_or_else(|| kind.label().to_string());
                self.payload(session, View::ConfirmAction { action, target })
            }
        }
    }

    async fn perform_action(
        &self,
        session: &Session,
        kind: EntityKind,
        action: PendingAction,
    ) -> Result<String> {
        use PendingAction::*;

        if let BulkResetAllTraffic = action {
            self.repos.bulk.reset_all_traffic().await?;
            return Ok("traffic counters reset for every user".to_string());
        }

        let uuid = session
            .active_entity
            .ok_or_else(|| ConsoleError::internal("no entity selected"))?;

        match (kind, action) {
            (EntityKind::User, Disable) => {
                self.repos.users.disable(uuid).await?;
                Ok("user disabled".to_string())
            }
            (EntityKind::User, Enable) => {
                self.repos.users.enable(uuid).await?;
                Ok("user enabled".to_string())
            }
            (EntityKind::User, ResetTraffic) => {
                self.repos.users.reset_traffic(uuid).await?;
                Ok("traffic counters reset".to_string())
            }
            (EntityKind::User, RevokeSubscription) => {
                self.repos.users.revoke_subscription(uuid).await?;
                Ok("subscription revoked".to_string())
            }
            (EntityKind::Node, Disable) => {
                self.repos.nodes.set_disabled(uuid, true).await?;
                Ok("node disabled".to_string())
            }
            (EntityKind::Node, Enable) => {
                self.repos.nodes.set_disabled(uuid, false).await?;
                Ok("node enabled".to_string())
            }
            (EntityKind::Node, Restart) => {
                self.repos.nodes.restart(uuid).await?;
                Ok("node restart requested".to_string())
            }
            (EntityKind::Host, Disable) => {
                let mut changes = serde_json::Map::new();
                changes.insert("isDisabled".to_string(), Value::from(true));
                self.repos.hosts.update(uuid, changes).await?;
                Ok("host disabled".to_string())
            }
            (EntityKind::Host, Enable) => {
                let mut changes = serde_json::Map::new();
                changes.insert("isDisabled".to_string(), Value::from(false));
                self.repos.hosts.update(uuid, changes).await?;
                Ok("host enabled".to_string())
            }
            _ => Err(ConsoleError::validation(format!(
                "{action} is not available for {}s",
                kind.label()
            ))),
        }
    }

    async fn on_confirm_typed(
        &self,
        session: &mut Session,
        kind: EntityKind,
        stage: ConfirmStage,
        event: OperatorEvent,
    ) -> RenderPayload {
        let target = session.confirmation_target.clone().unwrap_or_default();

        match stage {
            ConfirmStage::AwaitYes => match event {
                OperatorEvent::Confirm(true) => {
                    session.set_state(WizardState::ConfirmTyped {
                        kind,
                        stage: ConfirmStage::AwaitName,
                    });
                    self.payload(session, View::TypedPrompt { target })
                }
                OperatorEvent::Confirm(false) => {
                    session.pending_action = None;
                    session.confirmation_target = None;
                    session.set_state(WizardState::EntityMenu(kind));
                    self.payload(session, View::Notice("deletion cancelled".to_string()))
                }
                _ => match session.pending_action {
                    Some(action) => self.payload(session, View::ConfirmAction { action, target }),
                    None => {
                        session.set_state(WizardState::EntityMenu(kind));
                        self.payload(session, View::Error("no pending action".to_string()))
                    }
                },
            },
            ConfirmStage::AwaitName => match event {
                OperatorEvent::Text(typed) => match confirm_typed(&target, &typed) {
                    ConfirmOutcome::Match => {
                        let action = session.pending_action.take();
                        session.confirmation_target = None;
                        match self.perform_destructive(session, kind, action).await {
                            Ok(notice) => {
                                session.reset_to_root();
                                session.set_state(WizardState::Done);
                                self.payload(session, View::Notice(notice))
                            }
                            Err(err) => {
                                session.set_state(WizardState::EntityMenu(kind));
                                self.payload(session, View::Error(err.to_string()))
                            }
                        }
                    }
                    // A mismatch is a guarded re-prompt, not a cancellation.
                    ConfirmOutcome::Mismatch => self.payload(session, View::TypedPrompt { target }),
                },
                _ => self.payload(session, View::TypedPrompt { target }),
            },
        }
    }

    async fn perform_destructive(
        &self,
        session: &Session,
        kind: EntityKind,
        action: Option<PendingAction>,
    ) -> Result<String> {
        match action {
            Some(PendingAction::Delete) => {
                let uuid = session
                    .active_entity
                    .ok_or_else(|| ConsoleError::internal("no entity selected"))?;
                match kind {
                    EntityKind::User => self.repos.users.delete(uuid).await?,
                    EntityKind::Node => self.repos.nodes.delete(uuid).await?,
                    EntityKind::Host => self.repos.hosts.delete(uuid).await?,
                    EntityKind::ConfigProfile => self.repos.config_profiles.delete(uuid).await?,
                    EntityKind::Inbound => {
                        return Err(ConsoleError::validation(
                            "inbounds cannot be deleted from the console",
                        ))
                    }
                }
                tracing::info!(kind = kind.label(), %uuid, "entity deleted");
                Ok(format!("{} deleted", kind.label()))
            }
            Some(PendingAction::BulkDeleteByStatus(status)) => {
                let affected = self.repos.bulk.delete_by_status(status).await?;
                tracing::info!(%status, affected, "bulk delete by status");
                Ok(format!("deleted {affected} users in status {status}"))
            }
            _ => Err(ConsoleError::internal("no pending destructive action")),
        }
    }
}
