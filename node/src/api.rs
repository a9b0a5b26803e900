//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the node's vault engine over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! Callers identify themselves with a `caller` field in the request body.
//! This is a devnet: there is no authentication layer, and capability checks
//! are the engine's own.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                          |
//! |--------|-------------------------------|--------------------------------------|
//! | GET    | `/health`                     | Liveness probe                       |
//! | GET    | `/status`                     | Node status summary                  |
//! | GET    | `/config`                     | Engine configuration                 |
//! | GET    | `/price`                      | Oracle and token unit price          |
//! | GET    | `/price/required?amount=`     | Collateral a mint would lock         |
//! | GET    | `/vaults`                     | All vaults                           |
//! | GET    | `/vaults/:id`                 | Vault by id (zero-valued if unknown) |
//! | GET    | `/vaults/owner/:address`      | Vault by owner                       |
//! | GET    | `/accounts/:address`          | Balances and capabilities            |
//! | POST   | `/vaults`                     | Open a vault                         |
//! | POST   | `/vaults/collateral/add`      | Deposit collateral                   |
//! | POST   | `/vaults/collateral/remove`   | Withdraw collateral                  |
//! | POST   | `/vaults/mint`                | Mint synthetic tokens                |
//! | POST   | `/vaults/burn`                | Burn synthetic tokens                |
//! | POST   | `/admin/ratio`                | Set the collateral ratio             |
//! | POST   | `/admin/divisor`              | Set the price divisor                |
//! | POST   | `/admin/investors/grant`      | Grant the investor capability        |
//! | POST   | `/admin/investors/revoke`     | Revoke the investor capability       |
//! | POST   | `/admin/admins/grant`         | Grant the admin capability           |
//! | POST   | `/admin/admins/revoke`        | Revoke the admin capability          |
//! | POST   | `/devnet/oracle`              | Move the simulated price feed        |
//! | POST   | `/devnet/faucet`              | Issue stable asset to an account     |
//! | POST   | `/devnet/approve`             | Approve custody to pull collateral   |
//! | GET    | `/events?since=&limit=`       | One page of the event journal        |
//! | GET    | `/ws`                         | WebSocket for live events            |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use synthex_contracts::{Vault, VaultError};
use synthex_protocol::config::MAX_EVENTS_PAGE;
use synthex_protocol::types::decimal;
use synthex_protocol::{
    Address, Amount, CollateralLedger, EventRecord, EventSink, PriceOracle, SyntheticToken,
    VaultId,
};

use crate::devnet::Devnet;
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network label from the settings.
    pub network: String,
    /// The engine and its devnet collaborators.
    pub devnet: Devnet,
    /// Serializes mutating calls. The engine's reentrancy guard is global,
    /// so two overlapping requests would otherwise reject each other.
    pub submissions: Arc<Mutex<()>>,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<EventRecord>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

/// Forwards journaled events to WebSocket subscribers.
pub struct BroadcastSink {
    tx: broadcast::Sender<EventRecord>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<EventRecord>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, record: &EventRecord) {
        // No subscribers is not an error.
        let _ = self.tx.send(record.clone());
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/config", get(config_handler))
        .route("/price", get(price_handler))
        .route("/price/required", get(required_collateral_handler))
        .route("/vaults", get(list_vaults_handler).post(create_vault_handler))
        .route("/vaults/:id", get(vault_by_id_handler))
        .route("/vaults/owner/:address", get(vault_by_owner_handler))
        .route("/vaults/collateral/add", post(add_collateral_handler))
        .route("/vaults/collateral/remove", post(remove_collateral_handler))
        .route("/vaults/mint", post(mint_handler))
        .route("/vaults/burn", post(burn_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/admin/ratio", post(set_ratio_handler))
        .route("/admin/divisor", post(set_divisor_handler))
        .route("/admin/investors/grant", post(grant_investor_handler))
        .route("/admin/investors/revoke", post(revoke_investor_handler))
        .route("/admin/admins/grant", post(grant_admin_handler))
        .route("/admin/admins/revoke", post(revoke_admin_handler))
        .route("/devnet/oracle", post(devnet_oracle_handler))
        .route("/devnet/faucet", post(devnet_faucet_handler))
        .route("/devnet/approve", post(devnet_approve_handler))
        .route("/events", get(events_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /vaults`.
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: Address,
}

/// Body of the amount-carrying vault operations.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub caller: Address,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

/// Body of `POST /admin/ratio` and `POST /admin/divisor`.
#[derive(Debug, Deserialize)]
pub struct ParameterRequest {
    pub caller: Address,
    #[serde(with = "decimal")]
    pub value: Amount,
}

/// Body of the capability grant/revoke endpoints.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub caller: Address,
    pub account: Address,
}

/// Body of `POST /devnet/oracle`. Omitted fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct OracleRequest {
    #[serde(default, with = "optional_decimal")]
    pub price: Option<Amount>,
    pub online: Option<bool>,
}

/// Body of `POST /devnet/faucet`.
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub account: Address,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

/// Body of `POST /devnet/approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub owner: Address,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

/// Query of `GET /price/required`.
#[derive(Debug, Deserialize)]
pub struct RequiredQuery {
    #[serde(with = "decimal")]
    pub amount: Amount,
}

/// Query of `GET /events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
    /// Page size, clamped to [`MAX_EVENTS_PAGE`].
    pub limit: Option<usize>,
}

mod optional_decimal {
    use serde::{Deserialize, Deserializer};
    use synthex_protocol::Amount;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Amount>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "synthex_protocol::types::decimal")] Amount);

        Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(a)| a))
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub vault_count: usize,
    pub event_count: usize,
    /// Stable asset held by the engine's custody account.
    #[serde(with = "decimal")]
    pub collateral_in_custody: Amount,
    /// Outstanding synthetic token supply.
    #[serde(with = "decimal")]
    pub synthetic_supply: Amount,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /price`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    #[serde(with = "decimal")]
    pub oracle_price: Amount,
    #[serde(with = "decimal")]
    pub divisor: Amount,
    #[serde(with = "decimal")]
    pub token_price: Amount,
    #[serde(with = "decimal")]
    pub ratio: Amount,
}

/// Response payload for `GET /price/required`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequiredResponse {
    #[serde(with = "decimal")]
    pub amount: Amount,
    #[serde(with = "decimal")]
    pub required_collateral: Amount,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    #[serde(with = "decimal")]
    pub stable_balance: Amount,
    /// What the engine's custody account may still pull from this account.
    #[serde(with = "decimal")]
    pub custody_allowance: Amount,
    #[serde(with = "decimal")]
    pub synthetic_balance: Amount,
    pub investor: bool,
    pub admin: bool,
    pub vault_id: VaultId,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error code.
    pub code: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// An engine error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(VaultError);

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        Self(err)
    }
}

/// The HTTP status an engine error is reported with.
pub fn status_for(err: &VaultError) -> StatusCode {
    match err {
        VaultError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        VaultError::VaultNotFound(_) => StatusCode::NOT_FOUND,
        VaultError::VaultAlreadyExists { .. }
        | VaultError::ReentrantCall
        | VaultError::AccessChange(_) => StatusCode::CONFLICT,
        VaultError::InsufficientCollateral { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        VaultError::OracleUnavailable(_)
        | VaultError::TransferFailed(_)
        | VaultError::TokenOperationFailed(_) => StatusCode::BAD_GATEWAY,
        VaultError::DivisionByZero | VaultError::ArithmeticOverflow(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

fn error_response(status: StatusCode, code: &str, error: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: error.into(),
        code: code.to_string(),
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.devnet.engine;
    let custody = engine.config().custody;

    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        vault_count: engine.vault_count(),
        event_count: engine.events().len(),
        collateral_in_custody: state.devnet.ledger.balance_of(&custody),
        synthetic_supply: state.devnet.token.total_supply(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /config` — the engine configuration.
async fn config_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.devnet.engine.config())
}

/// `GET /price` — raw oracle price and the derived unit price.
async fn price_handler(State(state): State<AppState>) -> Result<Json<PriceResponse>, ApiError> {
    let engine = &state.devnet.engine;
    let config = engine.config();
    let oracle_price = state
        .devnet
        .oracle
        .price()
        .map_err(VaultError::OracleUnavailable)?;

    Ok(Json(PriceResponse {
        oracle_price,
        divisor: config.divisor,
        token_price: engine.token_price()?,
        ratio: config.ratio,
    }))
}

/// `GET /price/required?amount=` — collateral minting `amount` would lock.
async fn required_collateral_handler(
    State(state): State<AppState>,
    Query(query): Query<RequiredQuery>,
) -> Result<Json<RequiredResponse>, ApiError> {
    let required = state.devnet.engine.required_collateral(query.amount)?;
    Ok(Json(RequiredResponse {
        amount: query.amount,
        required_collateral: required,
    }))
}

/// `GET /vaults` — every vault in id order.
async fn list_vaults_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.devnet.engine.vaults())
}

/// `GET /vaults/:id` — unknown ids answer with the zero-valued vault.
async fn vault_by_id_handler(
    Path(id): Path<VaultId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(state.devnet.engine.get_vault(id))
}

/// `GET /vaults/owner/:address` — 404 if the address has no vault.
async fn vault_by_owner_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let owner = Address::new(address);
    match state.devnet.engine.vault_of(&owner) {
        Some(vault) => Json(vault).into_response(),
        None => ApiError(VaultError::VaultNotFound(owner)).into_response(),
    }
}

/// `GET /accounts/:address` — balances and capabilities of one principal.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let address = Address::new(address);
    let engine = &state.devnet.engine;
    let custody = engine.config().custody;

    Json(AccountResponse {
        stable_balance: state.devnet.ledger.balance_of(&address),
        custody_allowance: state.devnet.ledger.allowance(&address, &custody),
        synthetic_balance: state.devnet.token.balance_of(&address),
        investor: engine.has_investor_role(&address),
        admin: engine.is_admin(&address),
        vault_id: engine.vault_id_of(&address),
        address,
    })
}

/// `POST /vaults` — open a vault for `caller`.
async fn create_vault_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    submit(&state, |engine| engine.create_vault(&req.caller)).await
}

/// `POST /vaults/collateral/add`
async fn add_collateral_handler(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Response {
    submit(&state, |engine| engine.add_collateral(&req.caller, req.amount)).await
}

/// `POST /vaults/collateral/remove`
async fn remove_collateral_handler(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Response {
    submit(&state, |engine| engine.remove_collateral(&req.caller, req.amount)).await
}

/// `POST /vaults/mint`
async fn mint_handler(State(state): State<AppState>, Json(req): Json<AmountRequest>) -> Response {
    submit(&state, |engine| engine.mint(&req.caller, req.amount)).await
}

/// `POST /vaults/burn`
async fn burn_handler(State(state): State<AppState>, Json(req): Json<AmountRequest>) -> Response {
    submit(&state, |engine| engine.burn(&req.caller, req.amount)).await
}

/// `POST /admin/ratio`
async fn set_ratio_handler(
    State(state): State<AppState>,
    Json(req): Json<ParameterRequest>,
) -> Response {
    submit_admin(&state, |engine| engine.set_ratio(&req.caller, req.value)).await
}

/// `POST /admin/divisor`
async fn set_divisor_handler(
    State(state): State<AppState>,
    Json(req): Json<ParameterRequest>,
) -> Response {
    submit_admin(&state, |engine| engine.set_divisor(&req.caller, req.value)).await
}

/// `POST /admin/investors/grant`
async fn grant_investor_handler(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Response {
    submit_admin(&state, |engine| engine.grant_investor(&req.caller, &req.account)).await
}

/// `POST /admin/investors/revoke`
async fn revoke_investor_handler(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Response {
    submit_admin(&state, |engine| engine.revoke_investor(&req.caller, &req.account)).await
}

/// `POST /admin/admins/grant`
async fn grant_admin_handler(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Response {
    submit_admin(&state, |engine| engine.grant_admin(&req.caller, &req.account)).await
}

/// `POST /admin/admins/revoke`
async fn revoke_admin_handler(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Response {
    submit_admin(&state, |engine| engine.revoke_admin(&req.caller, &req.account)).await
}

/// `POST /devnet/oracle` — set the simulated feed's price and availability.
async fn devnet_oracle_handler(
    State(state): State<AppState>,
    Json(req): Json<OracleRequest>,
) -> impl IntoResponse {
    let _submission = state.submissions.lock().await;
    let oracle = &state.devnet.oracle;
    if let Some(price) = req.price {
        oracle.set_price(price);
    }
    if let Some(online) = req.online {
        oracle.set_online(online);
    }
    tracing::info!(price = ?req.price, online = ?req.online, "devnet oracle updated");
    Json(serde_json::json!({ "online": oracle.is_online() }))
}

/// `POST /devnet/faucet` — issue stable asset out of thin air.
async fn devnet_faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Response {
    let _submission = state.submissions.lock().await;
    match state.devnet.ledger.issue(&req.account, req.amount) {
        Ok(balance) => {
            tracing::info!(account = %req.account, amount = %req.amount, "faucet issued");
            Json(serde_json::json!({
                "account": req.account,
                "balance": balance.to_string(),
            }))
            .into_response()
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, "faucet_rejected", e.to_string()),
    }
}

/// `POST /devnet/approve` — stand-in for the owner signing an approval.
async fn devnet_approve_handler(
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> impl IntoResponse {
    let _submission = state.submissions.lock().await;
    let custody = state.devnet.engine.config().custody;
    state.devnet.ledger.approve(&req.owner, &custody, req.amount);
    Json(serde_json::json!({
        "owner": req.owner,
        "spender": custody,
        "allowance": req.amount.to_string(),
    }))
}

/// `GET /events?since=&limit=` — one page of journaled events after a
/// sequence number.
async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(MAX_EVENTS_PAGE).min(MAX_EVENTS_PAGE);
    Json(state.devnet.engine.events().page(query.since, limit))
}

/// Runs a vault operation under the submission lock and renders the vault.
async fn submit(
    state: &AppState,
    op: impl FnOnce(&synthex_contracts::VaultEngine) -> Result<Vault, VaultError>,
) -> Response {
    match execute(state, op).await {
        Ok(vault) => Json(vault).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Runs an administrative operation and renders the resulting configuration.
async fn submit_admin(
    state: &AppState,
    op: impl FnOnce(&synthex_contracts::VaultEngine) -> Result<(), VaultError>,
) -> Response {
    match execute(state, op).await {
        Ok(()) => Json(state.devnet.engine.config()).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn execute<T>(
    state: &AppState,
    op: impl FnOnce(&synthex_contracts::VaultEngine) -> Result<T, VaultError>,
) -> Result<T, ApiError> {
    let started = Instant::now();
    let _submission = state.submissions.lock().await;
    let result = op(&state.devnet.engine);
    state
        .metrics
        .operation_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    result.map_err(|err| {
        state.metrics.reject(err.code());
        ApiError(err)
    })
}

/// `GET /ws` — WebSocket upgrade for live event streaming.
///
/// Clients receive every [`EventRecord`] as JSON. The connection is
/// read-only from the server's perspective; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(record) => {
                        let payload = match serde_json::to_string(&record) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::metrics::{MetricsSink, NodeMetrics};
    use crate::settings::{FaucetGrant, NodeSettings};

    /// Devnet with `alice` as an investor holding 10_000 stable units, at an
    /// oracle price of 10.
    fn test_app_state() -> AppState {
        let settings = NodeSettings {
            investors: vec!["alice".into()],
            oracle_price: Amount::from(10u64),
            faucet: vec![FaucetGrant {
                account: "alice".into(),
                amount: Amount::from(10_000u64),
            }],
            ..NodeSettings::default()
        };
        let devnet = Devnet::from_settings(&settings).unwrap();
        let metrics = Arc::new(NodeMetrics::new());
        let (event_tx, _) = broadcast::channel(16);
        devnet
            .engine
            .add_sink(Arc::new(MetricsSink::new(metrics.clone())));
        devnet
            .engine
            .add_sink(Arc::new(BroadcastSink::new(event_tx.clone())));

        AppState {
            version: "0.1.0-test".into(),
            network: settings.network,
            devnet,
            submissions: Arc::new(Mutex::new(())),
            event_tx,
            metrics,
        }
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        read(resp).await
    }

    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        read(resp).await
    }

    async fn read(resp: Response) -> (StatusCode, Value) {
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Opens alice's vault and deposits 1_000.
    async fn funded_vault(router: &Router) {
        post_json(router, "/devnet/approve", json!({ "owner": "alice", "amount": "5000" })).await;
        let (status, _) = post_json(router, "/vaults", json!({ "caller": "alice" })).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_json(
            router,
            "/vaults/collateral/add",
            json!({ "caller": "alice", "amount": "1000" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collateral"], "1000");
    }

    #[tokio::test]
    async fn health_and_status() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["network"], "devnet");
        assert_eq!(body["vault_count"], 0);
        assert_eq!(body["event_count"], 1);
    }

    #[tokio::test]
    async fn vault_lifecycle_over_http() {
        let state = test_app_state();
        let router = create_router(state.clone());
        funded_vault(&router).await;

        // price 10, ratio 150: 10 * 20 * 150 / 100 = 300
        let (status, body) = get(&router, "/price/required?amount=20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["required_collateral"], "300");

        let (status, body) =
            post_json(&router, "/vaults/mint", json!({ "caller": "alice", "amount": 20 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collateral"], "700");
        assert_eq!(body["stake"], "1000");

        let (_, account) = get(&router, "/accounts/alice").await;
        assert_eq!(account["synthetic_balance"], "20");
        assert_eq!(account["stable_balance"], "9000");
        assert_eq!(account["vault_id"], 1);

        let (status, body) =
            post_json(&router, "/vaults/burn", json!({ "caller": "alice", "amount": "20" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collateral"], "1000");

        let (status, body) = post_json(
            &router,
            "/vaults/collateral/remove",
            json!({ "caller": "alice", "amount": "1000" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collateral"], "0");

        assert_eq!(state.metrics.vaults_created_total.get(), 1);
        assert_eq!(state.metrics.tokens_minted_total.get(), 1);
        assert_eq!(state.metrics.tokens_burned_total.get(), 1);
        assert_eq!(state.metrics.collateral_removed_total.get(), 1);
    }

    #[tokio::test]
    async fn vault_queries() {
        let router = create_router(test_app_state());
        funded_vault(&router).await;

        let (status, body) = get(&router, "/vaults/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["owner"], "alice");

        let (status, body) = get(&router, "/vaults/99").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 0);
        assert_eq!(body["owner"], "");
        assert_eq!(body["collateral"], "0");

        let (status, body) = get(&router, "/vaults/owner/alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);

        let (status, body) = get(&router, "/vaults/owner/bob").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "vault_not_found");

        let (_, body) = get(&router, "/vaults").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn errors_map_to_statuses() {
        let state = test_app_state();
        let router = create_router(state.clone());

        let (status, body) = post_json(&router, "/vaults", json!({ "caller": "mallory" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "unauthorized");

        let (status, _) =
            post_json(&router, "/vaults/mint", json!({ "caller": "alice", "amount": "1" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        funded_vault(&router).await;
        let (status, body) = post_json(&router, "/vaults", json!({ "caller": "alice" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "vault_already_exists");

        let (status, body) = post_json(
            &router,
            "/vaults/collateral/remove",
            json!({ "caller": "alice", "amount": "1001" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "insufficient_collateral");

        // Allowance is down to 4_000.
        let (status, body) = post_json(
            &router,
            "/vaults/collateral/add",
            json!({ "caller": "alice", "amount": "4001" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "transfer_failed");

        post_json(&router, "/devnet/oracle", json!({ "online": false })).await;
        let (status, body) = get(&router, "/price").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "oracle_unavailable");

        assert_eq!(
            state
                .metrics
                .rejected_operations_total
                .with_label_values(&["unauthorized"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn admin_endpoints() {
        let router = create_router(test_app_state());

        let (status, _) =
            post_json(&router, "/admin/ratio", json!({ "caller": "alice", "value": "200" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            post_json(&router, "/admin/ratio", json!({ "caller": "admin", "value": "200" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ratio"], "200");

        let (status, _) =
            post_json(&router, "/admin/divisor", json!({ "caller": "admin", "value": "0" })).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = get(&router, "/price").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "division_by_zero");

        let (status, _) = post_json(
            &router,
            "/admin/investors/grant",
            json!({ "caller": "admin", "account": "bob" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, account) = get(&router, "/accounts/bob").await;
        assert_eq!(account["investor"], true);

        let (status, body) = post_json(
            &router,
            "/admin/admins/revoke",
            json!({ "caller": "admin", "account": "admin" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "access_change_rejected");

        let (status, body) = post_json(
            &router,
            "/admin/investors/grant",
            json!({ "caller": "admin", "account": "synthex-vault" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "access_change_rejected");
        let (_, account) = get(&router, "/accounts/synthex-vault").await;
        assert_eq!(account["investor"], false);
    }

    #[tokio::test]
    async fn events_since_sequence() {
        let state = test_app_state();
        let mut live = state.event_tx.subscribe();
        let router = create_router(state);
        funded_vault(&router).await;

        let (status, body) = get(&router, "/events").await;
        assert_eq!(status, StatusCode::OK);
        let kinds: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["investor_granted", "vault_created", "collateral_added"]);

        let (_, body) = get(&router, "/events?since=2").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["amount"], "1000");

        let (_, body) = get(&router, "/events?since=0&limit=2").await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["sequence"], 2);

        // Only events after the subscription are broadcast.
        assert_eq!(live.recv().await.unwrap().event.kind(), "vault_created");
    }

    #[tokio::test]
    async fn devnet_controls() {
        let router = create_router(test_app_state());

        let (status, body) =
            post_json(&router, "/devnet/faucet", json!({ "account": "bob", "amount": "42" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "42");

        let (status, _) = post_json(&router, "/devnet/oracle", json!({ "price": "25" })).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = get(&router, "/price").await;
        assert_eq!(body["oracle_price"], "25");
        assert_eq!(body["token_price"], "25");

        let (_, body) = get(&router, "/config").await;
        assert_eq!(body["custody"], "synthex-vault");
    }
}
