//! End-to-end engine flows against a scripted transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use quarterdeck_core::entity::EntityKind;
use quarterdeck_core::event::{MenuChoice, OperatorEvent, RenderPayload, View};
use quarterdeck_core::session::{PendingAction, SearchCriterion, WizardState};
use quarterdeck_core::template::TemplateSet;
use quarterdeck_core::validation::FieldKind;
use quarterdeck_engine::{SessionKey, StaticAllowList, WizardEngine};
use quarterdeck_gateway::transport::{ApiRequest, HttpTransport, RawResponse, TransportError};
use quarterdeck_gateway::{GatewayClient, Repositories};

struct ScriptedTransport {
    responses: Mutex<Vec<(u16, String)>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<(u16, String)>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, i: usize) -> ApiRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(TransportError::Connect("script exhausted".into()));
        }
        let (status, body) = responses.remove(0);
        Ok(RawResponse { status, body })
    }
}

fn engine_over(responses: Vec<(u16, String)>) -> (Arc<ScriptedTransport>, WizardEngine) {
    let transport = Arc::new(ScriptedTransport::new(responses));
    // Single attempt keeps scripted failures deterministic.
    let client = Arc::new(GatewayClient::new(
        transport.clone(),
        1,
        Duration::from_secs(1),
    ));
    let engine = WizardEngine::new(
        Repositories::new(client, 8),
        Arc::new(StaticAllowList::new([1, 2])),
        TemplateSet::builtin(),
        8,
    );
    (transport, engine)
}

fn menu(choice: MenuChoice) -> OperatorEvent {
    OperatorEvent::Menu(choice)
}

fn text(s: &str) -> OperatorEvent {
    OperatorEvent::Text(s.to_string())
}

fn user_body(uuid: Uuid, name: &str) -> Value {
    json!({
        "uuid": uuid,
        "username": name,
        "status": "ACTIVE",
        "usedTrafficBytes": 0,
        "trafficLimitBytes": 0
    })
}

fn prompt_field(payload: &RenderPayload) -> FieldKind {
    match &payload.view {
        View::FieldPrompt { field, .. } => *field,
        other => panic!("expected a field prompt, got {other:?}"),
    }
}

fn prompt_notice(payload: &RenderPayload) -> Option<String> {
    match &payload.view {
        View::FieldPrompt { notice, .. } => notice.clone(),
        other => panic!("expected a field prompt, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_operator_is_denied_and_reset() {
    let (transport, engine) = engine_over(vec![]);
    let key = SessionKey::new(99, 10);

    let payload = engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::User))).await;
    assert_eq!(payload.state, WizardState::Root);
    assert_eq!(payload.view, View::Denied);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn cancel_discards_wizard_data_from_any_depth() {
    let (transport, engine) = engine_over(vec![]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::Node))).await;
    engine.handle_event(key, menu(MenuChoice::Create)).await;
    engine.handle_event(key, text("edge-1")).await;

    let payload = engine.handle_event(key, OperatorEvent::Cancel).await;
    assert_eq!(payload.state, WizardState::Root);
    assert_eq!(payload.view, View::MainMenu);

    // A fresh wizard starts from the first field again.
    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::Node))).await;
    let payload = engine.handle_event(key, menu(MenuChoice::Create)).await;
    assert_eq!(prompt_field(&payload), FieldKind::Name);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn validation_failure_reprompts_the_same_field() {
    let (transport, engine) = engine_over(vec![]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::Node))).await;
    engine.handle_event(key, menu(MenuChoice::Create)).await;
    engine.handle_event(key, text("edge-1")).await;
    engine.handle_event(key, text("10.0.0.1")).await;

    let payload = engine.handle_event(key, text("99999")).await;
    assert_eq!(prompt_field(&payload), FieldKind::Port);
    assert!(prompt_notice(&payload).is_some());

    let payload = engine.handle_event(key, text("443")).await;
    assert_eq!(prompt_field(&payload), FieldKind::CountryCode);
    // Local validation never touches the network.
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn remote_failure_preserves_collected_fields_and_resubmission_succeeds() {
    let node_uuid = Uuid::new_v4();
    let (transport, engine) = engine_over(vec![
        (500, "boom".to_string()),
        (
            200,
            json!({"response": {"uuid": node_uuid, "name": "edge-1", "address": "10.0.0.1"}})
                .to_string(),
        ),
    ]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::Node))).await;
    engine.handle_event(key, menu(MenuChoice::Create)).await;
    engine.handle_event(key, text("edge-1")).await;
    engine.handle_event(key, text("10.0.0.1")).await;
    engine.handle_event(key, text("443")).await;
    engine.handle_event(key, text("nl")).await;

    // Final field: the create call fails, the wizard must hold position.
    let payload = engine.handle_event(key, text("1.5")).await;
    assert_eq!(prompt_field(&payload), FieldKind::UsageCoefficient);
    assert!(prompt_notice(&payload).is_some());

    // Plain resubmission retries the call with everything still collected.
    let payload = engine.handle_event(key, text("1.5")).await;
    assert_eq!(payload.state, WizardState::Root);
    assert!(matches!(payload.view, View::Created { kind: EntityKind::Node, .. }));

    assert_eq!(transport.calls(), 2);
    let body = transport.request(1).body.unwrap();
    assert_eq!(body["name"], json!("edge-1"));
    assert_eq!(body["address"], json!("10.0.0.1"));
    assert_eq!(body["port"], json!(443));
    assert_eq!(body["countryCode"], json!("NL"));
    assert_eq!(body["usageCoefficient"], json!(1.5));
}

#[tokio::test]
async fn typed_delete_guard_requires_exact_name() {
    let user_uuid = Uuid::new_v4();
    let (transport, engine) = engine_over(vec![
        (
            200,
            json!({"response": {"total": 1, "users": [user_body(user_uuid, "alice123")]}})
                .to_string(),
        ),
        (200, json!({"response": true}).to_string()),
    ]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::User))).await;
    engine.handle_event(key, menu(MenuChoice::List)).await;
    engine.handle_event(key, menu(MenuChoice::Pick("1".into()))).await;

    let payload = engine
        .handle_event(key, menu(MenuChoice::Action(PendingAction::Delete)))
        .await;
    assert!(matches!(payload.view, View::ConfirmAction { .. }));

    let payload = engine.handle_event(key, OperatorEvent::Confirm(true)).await;
    assert!(matches!(payload.view, View::TypedPrompt { .. }));

    // Case and whitespace mismatches re-prompt without deleting.
    let payload = engine.handle_event(key, text("Alice123")).await;
    assert!(matches!(payload.view, View::TypedPrompt { .. }));
    let payload = engine.handle_event(key, text("alice123 ")).await;
    assert!(matches!(payload.view, View::TypedPrompt { .. }));
    assert_eq!(transport.calls(), 1); // only the listing so far

    // A retry with the exact name still goes through.
    let payload = engine.handle_event(key, text("alice123")).await;
    assert_eq!(payload.state, WizardState::Done);
    assert!(matches!(payload.view, View::Notice(_)));

    assert_eq!(transport.calls(), 2);
    let delete = transport.request(1);
    assert_eq!(delete.path, format!("users/{user_uuid}"));
    assert_eq!(delete.method.as_str(), "DELETE");
}

#[tokio::test]
async fn declining_the_first_confirmation_cancels() {
    let user_uuid = Uuid::new_v4();
    let (transport, engine) = engine_over(vec![(
        200,
        json!({"response": {"total": 1, "users": [user_body(user_uuid, "alice123")]}}).to_string(),
    )]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::User))).await;
    engine.handle_event(key, menu(MenuChoice::List)).await;
    engine.handle_event(key, menu(MenuChoice::Pick("1".into()))).await;
    engine
        .handle_event(key, menu(MenuChoice::Action(PendingAction::Delete)))
        .await;

    let payload = engine.handle_event(key, OperatorEvent::Confirm(false)).await;
    assert_eq!(payload.state, WizardState::EntityMenu(EntityKind::User));
    assert!(matches!(payload.view, View::Notice(_)));
    assert_eq!(transport.calls(), 1); // no delete was issued
}

#[tokio::test]
async fn sessions_do_not_share_wizard_state() {
    let (_transport, engine) = engine_over(vec![]);
    let alpha = SessionKey::new(1, 10);
    let beta = SessionKey::new(2, 20);

    engine.handle_event(alpha, menu(MenuChoice::Kind(EntityKind::Node))).await;
    engine.handle_event(alpha, menu(MenuChoice::Create)).await;
    engine.handle_event(alpha, text("alpha-node")).await;

    // The second session starts its own wizard from the first field.
    engine.handle_event(beta, menu(MenuChoice::Kind(EntityKind::Host))).await;
    let payload = engine.handle_event(beta, menu(MenuChoice::Create)).await;
    assert_eq!(prompt_field(&payload), FieldKind::Remark);

    // The first session is still waiting for its second field.
    let payload = engine.handle_event(alpha, text("10.1.1.1")).await;
    assert_eq!(prompt_field(&payload), FieldKind::Port);
}

#[tokio::test]
async fn template_create_issues_exactly_one_call_with_merged_values() {
    let user_uuid = Uuid::new_v4();
    let (transport, engine) = engine_over(vec![(
        200,
        json!({"response": user_body(user_uuid, "bob_01")}).to_string(),
    )]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::User))).await;
    let payload = engine.handle_event(key, menu(MenuChoice::Create)).await;
    assert!(matches!(payload.view, View::Notice(_))); // template choices

    let payload = engine
        .handle_event(key, menu(MenuChoice::Template("standard".into())))
        .await;
    assert_eq!(prompt_field(&payload), FieldKind::Username);

    let payload = engine.handle_event(key, text("bob_01")).await;
    assert_eq!(prompt_field(&payload), FieldKind::TrafficLimitBytes);
    match &payload.view {
        View::FieldPrompt { template_value, .. } => {
            assert_eq!(template_value.as_deref(), Some("322122547200"));
        }
        other => panic!("expected a field prompt, got {other:?}"),
    }

    engine.handle_event(key, menu(MenuChoice::KeepTemplateValue)).await;
    engine.handle_event(key, menu(MenuChoice::KeepTemplateValue)).await;
    engine.handle_event(key, menu(MenuChoice::KeepTemplateValue)).await;

    // Skipping the expiry applies the 30-day default.
    let payload = engine.handle_event(key, menu(MenuChoice::Skip)).await;
    assert_eq!(payload.state, WizardState::Root);
    match &payload.view {
        View::Created { kind, summary } => {
            assert_eq!(*kind, EntityKind::User);
            assert_eq!(summary.name, "bob_01");
            assert_eq!(summary.uuid, user_uuid);
        }
        other => panic!("expected a created view, got {other:?}"),
    }

    assert_eq!(transport.calls(), 1);
    let request = transport.request(0);
    assert_eq!(request.path, "users");
    assert_eq!(request.method.as_str(), "POST");

    let body = request.body.unwrap();
    assert_eq!(body["username"], json!("bob_01"));
    assert_eq!(body["trafficLimitBytes"], json!(322122547200u64));
    assert_eq!(body["hwidDeviceLimit"], json!(3));
    // A positive device limit forces the non-resetting strategy.
    assert_eq!(body["trafficLimitStrategy"], json!("NO_RESET"));
    assert_eq!(body["description"], json!("Standard VPN user"));
    assert_eq!(body["resetDay"], json!(1));
    assert!(body["expireAt"].as_str().unwrap().ends_with("T00:00:00.000Z"));
}

#[tokio::test]
async fn search_hit_renders_a_pickable_page() {
    let user_uuid = Uuid::new_v4();
    let (transport, engine) = engine_over(vec![(
        200,
        json!({"response": user_body(user_uuid, "alice123")}).to_string(),
    )]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::User))).await;
    let payload = engine
        .handle_event(key, menu(MenuChoice::Search(SearchCriterion::Username)))
        .await;
    assert!(matches!(payload.view, View::SearchPrompt { .. }));

    let payload = engine.handle_event(key, text("alice123")).await;
    match &payload.view {
        View::EntityPage { items, .. } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].1.name, "alice123");
        }
        other => panic!("expected an entity page, got {other:?}"),
    }
    assert_eq!(transport.request(0).path, "users/username/alice123");

    let payload = engine.handle_event(key, menu(MenuChoice::Pick("1".into()))).await;
    match &payload.view {
        View::EntityMenu { selected, .. } => {
            assert_eq!(selected.as_ref().unwrap().uuid, user_uuid);
        }
        other => panic!("expected an entity menu, got {other:?}"),
    }
}

#[tokio::test]
async fn stats_render_from_the_root_menu() {
    let (transport, engine) = engine_over(vec![(
        200,
        json!({"response": {"users": {"totalUsers": 12}, "onlineStats": {"onlineNow": 4}}})
            .to_string(),
    )]);
    let key = SessionKey::new(1, 10);

    let payload = engine.handle_event(key, menu(MenuChoice::Stats)).await;
    assert_eq!(payload.state, WizardState::Root);
    assert_eq!(
        payload.view,
        View::Notice("12 users total, 4 online now".to_string())
    );
    assert_eq!(transport.request(0).path, "system/stats");
}

#[tokio::test]
async fn unknown_short_id_fails_closed() {
    let user_uuid = Uuid::new_v4();
    let (_transport, engine) = engine_over(vec![(
        200,
        json!({"response": {"total": 1, "users": [user_body(user_uuid, "alice123")]}}).to_string(),
    )]);
    let key = SessionKey::new(1, 10);

    engine.handle_event(key, menu(MenuChoice::Kind(EntityKind::User))).await;
    engine.handle_event(key, menu(MenuChoice::List)).await;

    let payload = engine.handle_event(key, menu(MenuChoice::Pick("7".into()))).await;
    assert_eq!(payload.state, WizardState::ListSelect(EntityKind::User));
    assert!(matches!(payload.view, View::Notice(_)));
}
