use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use dataseal_consensus::Submission;
use dataseal_escrow::{EscrowPosition, PayoutBreakdown};
use dataseal_events::EventRecord;
use dataseal_oracle::{OracleRecord, SlashOutcome};
use dataseal_protocol::{ProtocolStatus, SubmissionReceipt, Tx, ValidationReceipt};
use dataseal_types::{
    AccountId, Amount, Attestation, AttestationKey, CommitmentDigest, DisputeResolution, MarketId,
    Score, SlashReason, Task, TaskId, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Largest page served by the event polling endpoint
pub const MAX_EVENT_PAGE: usize = 500;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub description: String,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Info endpoint
pub async fn info() -> impl IntoResponse {
    Json(InfoResponse {
        name: "DataSeal".to_string(),
        description: "Commit-reveal data settlement with oracle consensus".to_string(),
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub protocol: ProtocolStatus,
    pub now: Timestamp,
    pub uptime_seconds: u64,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let protocol = state.protocol()?.status()?;
    Ok(Json(StatusResponse {
        protocol,
        now: state.clock.now(),
        uptime_seconds: state.uptime_seconds(),
    }))
}

fn parse_amount(value: &str) -> Result<Amount, ApiError> {
    Amount::from_string(value).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_value(value: Option<&str>) -> Result<Amount, ApiError> {
    value.map_or(Ok(Amount::ZERO), parse_amount)
}

/// Caller identity and optional attached value (devnet only: not authenticated)
#[derive(Deserialize)]
pub struct TxRequest {
    pub sender: AccountId,
    #[serde(default)]
    pub value: Option<String>,
}

impl TxRequest {
    fn tx(&self, state: &AppState) -> Result<Tx, ApiError> {
        Ok(Tx::new(self.sender.clone(), state.clock.now()).with_value(parse_value(self.value.as_deref())?))
    }
}

// Accounts

#[derive(Deserialize)]
pub struct DepositRequest {
    pub account: AccountId,
    pub amount: String,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub account: AccountId,
    pub balance: Amount,
}

pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<BalanceResponse> {
    if !state.faucet {
        return Err(ApiError::forbidden("deposit faucet is disabled"));
    }
    let amount = parse_amount(&req.amount)?;
    let balance = state
        .protocol()?
        .deposit(&req.account, amount, state.clock.now())?;
    Ok(Json(BalanceResponse {
        account: req.account,
        balance,
    }))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> ApiResult<BalanceResponse> {
    let account = AccountId::new(account);
    let balance = state.protocol()?.balance(&account);
    Ok(Json(BalanceResponse { account, balance }))
}

// Markets

#[derive(Deserialize)]
pub struct RegisterMarketRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub market: MarketId,
}

pub async fn register_market(
    State(state): State<AppState>,
    Json(req): Json<RegisterMarketRequest>,
) -> ApiResult<serde_json::Value> {
    let tx = req.tx.tx(&state)?;
    state.protocol()?.register_market(&tx, req.market)?;
    Ok(Json(serde_json::json!({ "market": req.market, "registered": true })))
}

pub async fn list_market_tasks(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
) -> ApiResult<Vec<Task>> {
    let protocol = state.protocol()?;
    Ok(Json(
        protocol.tasks_by_market(market).into_iter().cloned().collect(),
    ))
}

// Tasks

#[derive(Deserialize)]
pub struct CommitRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub commitment: CommitmentDigest,
    pub market: MarketId,
    pub stake: String,
}

#[derive(Serialize)]
pub struct CommitResponse {
    pub task_id: TaskId,
    pub reveal_deadline: Timestamp,
}

pub async fn commit_task(
    State(state): State<AppState>,
    Json(req): Json<CommitRequest>,
) -> ApiResult<CommitResponse> {
    let tx = req.tx.tx(&state)?;
    let stake = parse_amount(&req.stake)?;
    let mut protocol = state.protocol()?;
    let task_id = protocol.commit(&tx, req.commitment, req.market, stake)?;
    let reveal_deadline = protocol.task(task_id)?.reveal_deadline;
    Ok(Json(CommitResponse {
        task_id,
        reveal_deadline,
    }))
}

#[derive(Deserialize)]
pub struct RevealRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub artifact_pointer: String,
}

#[derive(Serialize)]
pub struct RevealResponse {
    pub task_id: TaskId,
    pub validation_deadline: Timestamp,
}

pub async fn reveal_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<RevealRequest>,
) -> ApiResult<RevealResponse> {
    let tx = req.tx.tx(&state)?;
    let validation_deadline = state
        .protocol()?
        .reveal(&tx, task_id, &req.artifact_pointer)?;
    Ok(Json(RevealResponse {
        task_id,
        validation_deadline,
    }))
}

pub async fn lock_buyer_funds(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<TxRequest>,
) -> ApiResult<EscrowPosition> {
    let tx = req.tx(&state)?;
    let mut protocol = state.protocol()?;
    protocol.lock_buyer_funds(&tx, task_id)?;
    Ok(Json(protocol.position(task_id)?.clone()))
}

#[derive(Deserialize)]
pub struct VerificationRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub score: Score,
    pub attestation: Attestation,
}

pub async fn submit_verification(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<VerificationRequest>,
) -> ApiResult<SubmissionReceipt> {
    let tx = req.tx.tx(&state)?;
    let receipt = state
        .protocol()?
        .submit_verification(&tx, task_id, req.score, req.attestation)?;
    Ok(Json(receipt))
}

pub async fn settle_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<TxRequest>,
) -> ApiResult<PayoutBreakdown> {
    let tx = req.tx(&state)?;
    Ok(Json(state.protocol()?.settle(&tx, task_id)?))
}

pub async fn initiate_dispute(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<TxRequest>,
) -> ApiResult<Task> {
    let tx = req.tx(&state)?;
    let mut protocol = state.protocol()?;
    protocol.initiate_dispute(&tx, task_id)?;
    Ok(Json(protocol.task(task_id)?.clone()))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub resolution: DisputeResolution,
}

pub async fn resolve_dispute(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Option<PayoutBreakdown>> {
    let tx = req.tx.tx(&state)?;
    Ok(Json(
        state
            .protocol()?
            .resolve_dispute(&tx, task_id, req.resolution)?,
    ))
}

pub async fn cancel_expired(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<TxRequest>,
) -> ApiResult<Task> {
    let tx = req.tx(&state)?;
    let mut protocol = state.protocol()?;
    protocol.cancel_expired(&tx, task_id)?;
    Ok(Json(protocol.task(task_id)?.clone()))
}

#[derive(Deserialize)]
pub struct EmergencyRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub score: Score,
}

pub async fn emergency_finalize(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(req): Json<EmergencyRequest>,
) -> ApiResult<ValidationReceipt> {
    let tx = req.tx.tx(&state)?;
    Ok(Json(
        state
            .protocol()?
            .emergency_finalize(&tx, task_id, req.score)?,
    ))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<Task> {
    Ok(Json(state.protocol()?.task(task_id)?.clone()))
}

#[derive(Serialize)]
pub struct TimeRemainingResponse {
    pub task_id: TaskId,
    pub now: Timestamp,
    pub seconds: Option<u64>,
}

pub async fn get_time_remaining(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<TimeRemainingResponse> {
    let now = state.clock.now();
    let seconds = state.protocol()?.time_remaining(task_id, now)?;
    Ok(Json(TimeRemainingResponse {
        task_id,
        now,
        seconds,
    }))
}

#[derive(Serialize)]
pub struct ConsensusResponse {
    pub task_id: TaskId,
    pub submission_count: usize,
    pub has_consensus: bool,
    pub finalized: bool,
    pub submission_time_remaining: Option<u64>,
    pub slash_candidates: Vec<AccountId>,
    pub submissions: Vec<Submission>,
}

pub async fn get_consensus(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<ConsensusResponse> {
    let now = state.clock.now();
    let protocol = state.protocol()?;
    Ok(Json(ConsensusResponse {
        task_id,
        submission_count: protocol.submission_count(task_id),
        has_consensus: protocol.has_consensus(task_id),
        finalized: protocol.is_finalized(task_id),
        submission_time_remaining: protocol.submission_time_remaining(task_id, now)?,
        slash_candidates: protocol.slash_candidates(task_id),
        submissions: protocol.submissions(task_id).to_vec(),
    }))
}

pub async fn get_escrow(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<EscrowPosition> {
    Ok(Json(state.protocol()?.position(task_id)?.clone()))
}

pub async fn list_provider_tasks(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Vec<Task>> {
    let protocol = state.protocol()?;
    Ok(Json(
        protocol
            .tasks_by_provider(&AccountId::new(provider))
            .into_iter()
            .cloned()
            .collect(),
    ))
}

// Oracles

#[derive(Deserialize)]
pub struct RegisterOracleRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub attestation_key: AttestationKey,
}

pub async fn register_oracle(
    State(state): State<AppState>,
    Json(req): Json<RegisterOracleRequest>,
) -> ApiResult<OracleRecord> {
    let tx = req.tx.tx(&state)?;
    let mut protocol = state.protocol()?;
    protocol.register_oracle(&tx, req.attestation_key)?;
    Ok(Json(protocol.oracle(&tx.sender)?.clone()))
}

pub async fn increase_oracle_stake(
    State(state): State<AppState>,
    Json(req): Json<TxRequest>,
) -> ApiResult<OracleRecord> {
    let tx = req.tx(&state)?;
    let mut protocol = state.protocol()?;
    protocol.increase_oracle_stake(&tx)?;
    Ok(Json(protocol.oracle(&tx.sender)?.clone()))
}

pub async fn deactivate_oracle(
    State(state): State<AppState>,
    Json(req): Json<TxRequest>,
) -> ApiResult<OracleRecord> {
    let tx = req.tx(&state)?;
    let mut protocol = state.protocol()?;
    protocol.deactivate_oracle(&tx)?;
    Ok(Json(protocol.oracle(&tx.sender)?.clone()))
}

#[derive(Deserialize)]
pub struct SlashRequest {
    #[serde(flatten)]
    pub tx: TxRequest,
    pub oracle: AccountId,
    pub reason: SlashReason,
}

pub async fn slash_oracle(
    State(state): State<AppState>,
    Json(req): Json<SlashRequest>,
) -> ApiResult<SlashOutcome> {
    let tx = req.tx.tx(&state)?;
    Ok(Json(
        state
            .protocol()?
            .slash_oracle(&tx, &req.oracle, req.reason)?,
    ))
}

pub async fn list_active_oracles(State(state): State<AppState>) -> ApiResult<Vec<OracleRecord>> {
    let protocol = state.protocol()?;
    Ok(Json(
        protocol.active_oracles().into_iter().cloned().collect(),
    ))
}

pub async fn get_oracle(
    State(state): State<AppState>,
    Path(oracle): Path<String>,
) -> ApiResult<OracleRecord> {
    Ok(Json(
        state.protocol()?.oracle(&AccountId::new(oracle))?.clone(),
    ))
}

// Events

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub after: u64,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    /// Cursor to pass as `after` on the next poll
    pub next: u64,
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<EventsResponse> {
    let limit = query.limit.unwrap_or(100).min(MAX_EVENT_PAGE);
    let protocol = state.protocol()?;
    let events = protocol.events_after(query.after, limit).to_vec();
    let next = events.last().map_or(query.after, |record| record.sequence);
    Ok(Json(EventsResponse { events, next }))
}
