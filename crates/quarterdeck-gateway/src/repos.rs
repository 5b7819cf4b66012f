//! Typed repositories over the gateway client.
//!
//! Each repository expresses the operations for one entity kind purely as
//! gateway calls plus decode. No state is held here; sessions cache what
//! they need and every mutation round-trips through the panel.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use quarterdeck_core::entity::{ConfigProfile, Host, Inbound, Node, User, UserStatus};
use quarterdeck_core::error::{ConsoleError, Result};
use quarterdeck_core::session::SearchCriterion;

use crate::client::GatewayClient;
use crate::pagination::{fetch_all, list_from};

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| ConsoleError::malformed(format!("unexpected entity shape: {err}")))
}

fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>> {
    items.into_iter().map(decode).collect()
}

/// User accounts.
pub struct UserRepo {
    client: Arc<GatewayClient>,
    page_size: usize,
}

impl UserRepo {
    pub fn new(client: Arc<GatewayClient>, page_size: usize) -> Self {
        Self { client, page_size }
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let items = fetch_all(&self.client, "users", "users", self.page_size).await?;
        decode_items(items)
    }

    pub async fn get(&self, uuid: Uuid) -> Result<Option<User>> {
        match self.client.get_opt(&format!("users/{uuid}")).await? {
            Some(value) => Ok(Some(decode(value)?)),
            None => Ok(None),
        }
    }

    /// Exact-match lookup by one criterion. The lookup endpoints answer
    /// with a single object or an array depending on the criterion; both
    /// shapes normalize to a list here.
    pub async fn find(&self, criterion: SearchCriterion, query: &str) -> Result<Vec<User>> {
        let path = match criterion {
            SearchCriterion::Username => format!("users/username/{query}"),
            SearchCriterion::TelegramId => format!("users/tg/{query}"),
            SearchCriterion::Email => format!("users/email/{query}"),
            SearchCriterion::Tag => format!("users/tag/{query}"),
        };
        match self.client.get_opt(&path).await? {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => decode_items(items),
            Some(single) => Ok(vec![decode(single)?]),
        }
    }

    pub async fn create(&self, payload: Value) -> Result<User> {
        decode(self.client.post("users", payload).await?)
    }

    /// Partial update; the panel expects the target uuid inside the body.
    pub async fn update(&self, uuid: Uuid, mut changes: serde_json::Map<String, Value>) -> Result<User> {
        changes.insert("uuid".to_string(), json!(uuid));
        decode(self.client.patch("users", Value::Object(changes)).await?)
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete(&format!("users/{uuid}")).await?;
        Ok(())
    }

    pub async fn enable(&self, uuid: Uuid) -> Result<User> {
        decode(self.client.post_empty(&format!("users/{uuid}/actions/enable")).await?)
    }

    pub async fn disable(&self, uuid: Uuid) -> Result<User> {
        decode(self.client.post_empty(&format!("users/{uuid}/actions/disable")).await?)
    }

    pub async fn reset_traffic(&self, uuid: Uuid) -> Result<User> {
        decode(
            self.client
                .post_empty(&format!("users/{uuid}/actions/reset-traffic"))
                .await?,
        )
    }

    pub async fn revoke_subscription(&self, uuid: Uuid) -> Result<User> {
        decode(
            self.client
                .post_empty(&format!("users/{uuid}/actions/revoke"))
                .await?,
        )
    }
}

/// Server nodes.
pub struct NodeRepo {
    client: Arc<GatewayClient>,
    page_size: usize,
}

impl NodeRepo {
    pub fn new(client: Arc<GatewayClient>, page_size: usize) -> Self {
        Self { client, page_size }
    }

    pub async fn list(&self) -> Result<Vec<Node>> {
        let items = fetch_all(&self.client, "nodes", "nodes", self.page_size).await?;
        decode_items(items)
    }

    pub async fn get(&self, uuid: Uuid) -> Result<Option<Node>> {
        match self.client.get_opt(&format!("nodes/{uuid}")).await? {
            Some(value) => Ok(Some(decode(value)?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, payload: Value) -> Result<Node> {
        decode(self.client.post("nodes", payload).await?)
    }

    pub async fn update(&self, uuid: Uuid, mut changes: serde_json::Map<String, Value>) -> Result<Node> {
        changes.insert("uuid".to_string(), json!(uuid));
        decode(self.client.patch("nodes", Value::Object(changes)).await?)
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete(&format!("nodes/{uuid}")).await?;
        Ok(())
    }

    /// Enable/disable are plain field updates, not action endpoints.
    pub async fn set_disabled(&self, uuid: Uuid, disabled: bool) -> Result<Node> {
        let mut changes = serde_json::Map::new();
        changes.insert("isDisabled".to_string(), json!(disabled));
        self.update(uuid, changes).await
    }

    pub async fn restart(&self, uuid: Uuid) -> Result<()> {
        self.client.post_empty(&format!("nodes/{uuid}/restart")).await?;
        Ok(())
    }

    pub async fn restart_all(&self) -> Result<()> {
        self.client.post_empty("nodes/restart").await?;
        Ok(())
    }
}

/// Connection hosts.
pub struct HostRepo {
    client: Arc<GatewayClient>,
    page_size: usize,
}

impl HostRepo {
    pub fn new(client: Arc<GatewayClient>, page_size: usize) -> Self {
        Self { client, page_size }
    }

    pub async fn list(&self) -> Result<Vec<Host>> {
        let items = fetch_all(&self.client, "hosts", "hosts", self.page_size).await?;
        decode_items(items)
    }

    pub async fn get(&self, uuid: Uuid) -> Result<Option<Host>> {
        match self.client.get_opt(&format!("hosts/{uuid}")).await? {
            Some(value) => Ok(Some(decode(value)?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, payload: Value) -> Result<Host> {
        decode(self.client.post("hosts", payload).await?)
    }

    pub async fn update(&self, uuid: Uuid, mut changes: serde_json::Map<String, Value>) -> Result<Host> {
        changes.insert("uuid".to_string(), json!(uuid));
        decode(self.client.patch("hosts", Value::Object(changes)).await?)
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete(&format!("hosts/{uuid}")).await?;
        Ok(())
    }

    pub async fn bulk_enable(&self, uuids: &[Uuid]) -> Result<()> {
        self.client
            .post("hosts/bulk/enable", json!({ "uuids": uuids }))
            .await?;
        Ok(())
    }

    pub async fn bulk_disable(&self, uuids: &[Uuid]) -> Result<()> {
        self.client
            .post("hosts/bulk/disable", json!({ "uuids": uuids }))
            .await?;
        Ok(())
    }

    pub async fn bulk_delete(&self, uuids: &[Uuid]) -> Result<()> {
        self.client
            .post("hosts/bulk/delete", json!({ "uuids": uuids }))
            .await?;
        Ok(())
    }
}

/// Inbounds, exposed through the config-profile surface.
pub struct InboundRepo {
    client: Arc<GatewayClient>,
}

impl InboundRepo {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self { client }
    }

    /// Inbounds are a small flat collection; the endpoint is not paginated.
    pub async fn list(&self) -> Result<Vec<Inbound>> {
        let value = self.client.get("config-profiles/inbounds").await?;
        decode_items(list_from(value, "inbounds")?)
    }
}

/// Configuration profiles.
pub struct ConfigProfileRepo {
    client: Arc<GatewayClient>,
}

impl ConfigProfileRepo {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<ConfigProfile>> {
        let value = self.client.get("config-profiles").await?;
        decode_items(list_from(value, "configProfiles")?)
    }

    pub async fn get(&self, uuid: Uuid) -> Result<Option<ConfigProfile>> {
        match self.client.get_opt(&format!("config-profiles/{uuid}")).await? {
            Some(value) => Ok(Some(decode(value)?)),
            None => Ok(None),
        }
    }

    /// Inbounds of one profile. Prefers the dedicated sub-resource and
    /// falls back to the inbounds embedded in the profile object.
    pub async fn inbounds_of(&self, uuid: Uuid) -> Result<Vec<Inbound>> {
        match self
            .client
            .get_opt(&format!("config-profiles/{uuid}/inbounds"))
            .await?
        {
            Some(value) => decode_items(list_from(value, "inbounds")?),
            None => Ok(self
                .get(uuid)
                .await?
                .map(|profile| profile.inbounds)
                .unwrap_or_default()),
        }
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.client.delete(&format!("config-profiles/{uuid}")).await?;
        Ok(())
    }
}

fn affected_rows(value: &Value) -> u64 {
    value
        .get("affectedRows")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Panel-wide bulk user operations. Each call is a single request; the
/// panel decides how atomic the fan-out is.
pub struct BulkRepo {
    client: Arc<GatewayClient>,
}

impl BulkRepo {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self { client }
    }

    /// Resets traffic counters for every account at once.
    pub async fn reset_all_traffic(&self) -> Result<()> {
        self.client.post_empty("users/bulk/all/reset-traffic").await?;
        Ok(())
    }

    /// Deletes every account in the given status. Returns the affected
    /// count when the panel reports one.
    pub async fn delete_by_status(&self, status: UserStatus) -> Result<u64> {
        let value = self
            .client
            .post("users/bulk/delete-by-status", json!({ "status": status }))
            .await?;
        Ok(affected_rows(&value))
    }

    pub async fn delete(&self, uuids: &[Uuid]) -> Result<u64> {
        let value = self
            .client
            .post("users/bulk/delete", json!({ "uuids": uuids }))
            .await?;
        Ok(affected_rows(&value))
    }

    pub async fn revoke(&self, uuids: &[Uuid]) -> Result<u64> {
        let value = self
            .client
            .post("users/bulk/revoke-subscription", json!({ "uuids": uuids }))
            .await?;
        Ok(affected_rows(&value))
    }

    pub async fn reset_traffic(&self, uuids: &[Uuid]) -> Result<u64> {
        let value = self
            .client
            .post("users/bulk/reset-traffic", json!({ "uuids": uuids }))
            .await?;
        Ok(affected_rows(&value))
    }

    /// Applies one set of field changes to many accounts.
    pub async fn update(
        &self,
        uuids: &[Uuid],
        fields: serde_json::Map<String, Value>,
    ) -> Result<u64> {
        let value = self
            .client
            .post(
                "users/bulk/update",
                json!({ "uuids": uuids, "fields": fields }),
            )
            .await?;
        Ok(affected_rows(&value))
    }
}

/// Read-only system statistics.
pub struct SystemRepo {
    client: Arc<GatewayClient>,
}

impl SystemRepo {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self { client }
    }

    pub async fn stats(&self) -> Result<Value> {
        self.client.get("system/stats").await
    }

    pub async fn bandwidth_stats(&self) -> Result<Value> {
        self.client.get("system/stats/bandwidth").await
    }

    pub async fn node_stats(&self) -> Result<Value> {
        self.client.get("system/stats/nodes").await
    }
}

/// Bundle of all repositories over one shared client.
pub struct Repositories {
    pub users: UserRepo,
    pub nodes: NodeRepo,
    pub hosts: HostRepo,
    pub inbounds: InboundRepo,
    pub config_profiles: ConfigProfileRepo,
    pub bulk: BulkRepo,
    pub system: SystemRepo,
}

impl Repositories {
    pub fn new(client: Arc<GatewayClient>, page_size: usize) -> Self {
        Self {
            users: UserRepo::new(client.clone(), page_size),
            nodes: NodeRepo::new(client.clone(), page_size),
            hosts: HostRepo::new(client.clone(), page_size),
            inbounds: InboundRepo::new(client.clone()),
            config_profiles: ConfigProfileRepo::new(client.clone()),
            bulk: BulkRepo::new(client.clone()),
            system: SystemRepo::new(client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::transport::{ApiRequest, HttpTransport, RawResponse, TransportError};

    struct RecordingTransport {
        responses: Mutex<Vec<(u16, String)>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl RecordingTransport {
        fn new(responses: Vec<(u16, String)>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request(&self, i: usize) -> ApiRequest {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for RecordingTransport {
        async fn send(&self, request: ApiRequest) -> std::result::Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError::Connect("script exhausted".into()));
            }
            let (status, body) = responses.remove(0);
            Ok(RawResponse { status, body })
        }
    }

    fn client_over(transport: Arc<RecordingTransport>) -> Arc<GatewayClient> {
        Arc::new(GatewayClient::new(transport, 1, Duration::from_secs(1)))
    }

    fn user_json(name: &str) -> Value {
        json!({
            "uuid": Uuid::new_v4(),
            "username": name,
            "status": "ACTIVE"
        })
    }

    #[tokio::test]
    async fn find_by_username_tolerates_single_object() {
        let transport = Arc::new(RecordingTransport::new(vec![(
            200,
            json!({"response": user_json("alice123")}).to_string(),
        )]));
        let repo = UserRepo::new(client_over(transport.clone()), 8);

        let found = repo.find(SearchCriterion::Username, "alice123").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "alice123");
        assert_eq!(transport.request(0).path, "users/username/alice123");
    }

    #[tokio::test]
    async fn find_by_telegram_id_tolerates_array() {
        let transport = Arc::new(RecordingTransport::new(vec![(
            200,
            json!({"response": [user_json("a_000001"), user_json("b_000001")]}).to_string(),
        )]));
        let repo = UserRepo::new(client_over(transport.clone()), 8);

        let found = repo.find(SearchCriterion::TelegramId, "42").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(transport.request(0).path, "users/tg/42");
    }

    #[tokio::test]
    async fn find_miss_is_empty_not_error() {
        let transport = Arc::new(RecordingTransport::new(vec![(404, String::new())]));
        let repo = UserRepo::new(client_over(transport), 8);

        let found = repo.find(SearchCriterion::Email, "x@y.z").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn node_update_carries_uuid_in_body() {
        let uuid = Uuid::new_v4();
        let transport = Arc::new(RecordingTransport::new(vec![(
            200,
            json!({"response": {"uuid": uuid, "name": "edge-1", "address": "10.0.0.1", "isDisabled": true}})
                .to_string(),
        )]));
        let repo = NodeRepo::new(client_over(transport.clone()), 8);

        let node = repo.set_disabled(uuid, true).await.unwrap();
        assert!(node.is_disabled);

        let sent = transport.request(0);
        assert_eq!(sent.path, "nodes");
        let body = sent.body.unwrap();
        assert_eq!(body["uuid"], json!(uuid));
        assert_eq!(body["isDisabled"], json!(true));
    }

    #[tokio::test]
    async fn bulk_delete_by_status_reports_affected_rows() {
        let transport = Arc::new(RecordingTransport::new(vec![(
            200,
            json!({"response": {"affectedRows": 7}}).to_string(),
        )]));
        let repo = BulkRepo::new(client_over(transport.clone()));

        let affected = repo.delete_by_status(UserStatus::Expired).await.unwrap();
        assert_eq!(affected, 7);

        let sent = transport.request(0);
        assert_eq!(sent.path, "users/bulk/delete-by-status");
        assert_eq!(sent.body.unwrap()["status"], json!("EXPIRED"));
    }

    #[tokio::test]
    async fn bulk_user_operations_post_uuid_lists() {
        let uuids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let transport = Arc::new(RecordingTransport::new(vec![
            (200, json!({"response": {"affectedRows": 2}}).to_string()),
            (200, json!({"response": {"affectedRows": 2}}).to_string()),
            (200, json!({"response": {"affectedRows": 2}}).to_string()),
        ]));
        let repo = BulkRepo::new(client_over(transport.clone()));

        assert_eq!(repo.reset_traffic(&uuids).await.unwrap(), 2);
        assert_eq!(repo.revoke(&uuids).await.unwrap(), 2);
        assert_eq!(repo.delete(&uuids).await.unwrap(), 2);

        assert_eq!(transport.request(0).path, "users/bulk/reset-traffic");
        assert_eq!(transport.request(1).path, "users/bulk/revoke-subscription");
        assert_eq!(transport.request(2).path, "users/bulk/delete");
        assert_eq!(transport.request(2).body.unwrap()["uuids"], json!(uuids));
    }

    #[tokio::test]
    async fn host_bulk_operations_post_uuid_lists() {
        let uuids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let transport = Arc::new(RecordingTransport::new(vec![
            (200, json!({"response": {}}).to_string()),
            (200, json!({"response": {}}).to_string()),
            (200, json!({"response": {}}).to_string()),
        ]));
        let repo = HostRepo::new(client_over(transport.clone()), 8);

        repo.bulk_enable(&uuids).await.unwrap();
        repo.bulk_disable(&uuids).await.unwrap();
        repo.bulk_delete(&uuids).await.unwrap();

        assert_eq!(transport.request(0).path, "hosts/bulk/enable");
        assert_eq!(transport.request(1).path, "hosts/bulk/disable");
        assert_eq!(transport.request(2).path, "hosts/bulk/delete");
        assert_eq!(transport.request(0).body.unwrap()["uuids"], json!(uuids));
    }

    #[tokio::test]
    async fn node_restarts_post_to_the_restart_endpoints() {
        let uuid = Uuid::new_v4();
        let transport = Arc::new(RecordingTransport::new(vec![
            (200, json!({"response": {"eventSent": true}}).to_string()),
            (200, json!({"response": {"eventSent": true}}).to_string()),
        ]));
        let repo = NodeRepo::new(client_over(transport.clone()), 8);

        repo.restart(uuid).await.unwrap();
        repo.restart_all().await.unwrap();

        assert_eq!(transport.request(0).path, format!("nodes/{uuid}/restart"));
        assert!(transport.request(0).body.is_none());
        assert_eq!(transport.request(1).path, "nodes/restart");
    }

    #[tokio::test]
    async fn bulk_update_sends_uuids_and_field_changes() {
        let uuids = vec![Uuid::new_v4()];
        let transport = Arc::new(RecordingTransport::new(vec![(
            200,
            json!({"response": {"affectedRows": 1}}).to_string(),
        )]));
        let repo = BulkRepo::new(client_over(transport.clone()));

        let mut fields = serde_json::Map::new();
        fields.insert("trafficLimitBytes".to_string(), json!(1024));

        assert_eq!(repo.update(&uuids, fields).await.unwrap(), 1);

        let sent = transport.request(0);
        assert_eq!(sent.path, "users/bulk/update");
        let body = sent.body.unwrap();
        assert_eq!(body["uuids"], json!(uuids));
        assert_eq!(body["fields"]["trafficLimitBytes"], json!(1024));
    }

    #[tokio::test]
    async fn profile_inbounds_fall_back_to_the_embedded_list() {
        let profile_uuid = Uuid::new_v4();
        let transport = Arc::new(RecordingTransport::new(vec![
            (404, String::new()),
            (
                200,
                json!({
                    "response": {
                        "uuid": profile_uuid,
                        "name": "default",
                        "inbounds": [{"uuid": Uuid::new_v4(), "tag": "SS_TCP"}]
                    }
                })
                .to_string(),
            ),
        ]));
        let repo = ConfigProfileRepo::new(client_over(transport.clone()));

        let inbounds = repo.inbounds_of(profile_uuid).await.unwrap();
        assert_eq!(inbounds.len(), 1);
        assert_eq!(inbounds[0].tag, "SS_TCP");
        assert_eq!(
            transport.request(0).path,
            format!("config-profiles/{profile_uuid}/inbounds")
        );
        assert_eq!(
            transport.request(1).path,
            format!("config-profiles/{profile_uuid}")
        );
    }

    #[tokio::test]
    async fn system_stats_hit_the_expected_endpoints() {
        let transport = Arc::new(RecordingTransport::new(vec![
            (200, json!({"response": {"users": {"totalUsers": 5}}}).to_string()),
            (200, json!({"response": {"bandwidth": "1 TB"}}).to_string()),
            (200, json!({"response": []}).to_string()),
        ]));
        let repo = SystemRepo::new(client_over(transport.clone()));

        repo.stats().await.unwrap();
        repo.bandwidth_stats().await.unwrap();
        repo.node_stats().await.unwrap();

        assert_eq!(transport.request(0).path, "system/stats");
        assert_eq!(transport.request(1).path, "system/stats/bandwidth");
        assert_eq!(transport.request(2).path, "system/stats/nodes");
    }

    #[tokio::test]
    async fn config_profiles_decode_with_nested_inbounds() {
        let transport = Arc::new(RecordingTransport::new(vec![(
            200,
            json!({
                "response": {
                    "total": 1,
                    "configProfiles": [{
                        "uuid": Uuid::new_v4(),
                        "name": "default",
                        "inbounds": [{
                            "uuid": Uuid::new_v4(),
                            "tag": "VLESS_TCP",
                            "type": "vless",
                            "port": 443
                        }]
                    }]
                }
            })
            .to_string(),
        )]));
        let repo = ConfigProfileRepo::new(client_over(transport));

        let profiles = repo.list().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].inbounds[0].tag, "VLESS_TCP");
    }
}
