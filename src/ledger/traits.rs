//! Trait abstraction for ledger access.
//!
//! The discovery engine talks to two remote services: a transaction-history
//! service and a contract-simulation service. Both sit behind
//! [`LedgerClient`] so the engine can run against [`super::mock::MockLedgerClient`]
//! in tests and [`super::horizon::HorizonLedgerClient`] in production.

use super::xdr::ScArg;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Horizon caps page size at 200 records.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Transport-level failures talking to the ledger services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Ordering of a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// Paging parameters for [`LedgerClient::fetch_account_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub order: Order,
    limit: u32,
}

impl HistoryQuery {
    /// Build a query; `limit` is clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(order: Order, limit: u32) -> Self {
        Self {
            order,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Most recent `limit` transactions first.
    pub fn newest(limit: u32) -> Self {
        Self::new(Order::Desc, limit)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// A transaction record as returned by the history service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,

    pub successful: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub memo: Option<String>,

    #[serde(default)]
    pub memo_type: Option<String>,

    /// Base64 `TransactionEnvelope`
    #[serde(default)]
    pub envelope_xdr: String,

    /// Base64 `TransactionResult`
    #[serde(default)]
    pub result_xdr: String,

    /// Base64 `TransactionMeta`, which carries the invocation's return value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_meta_xdr: Option<String>,

    /// Operations, when the record already embeds them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<RawOperation>,
}

impl RawTransaction {
    /// The memo, if it is a text memo.
    pub fn memo_text(&self) -> Option<&str> {
        match (self.memo_type.as_deref(), self.memo.as_deref()) {
            (Some("text"), Some(memo)) => Some(memo),
            _ => None,
        }
    }
}

/// Operation type, as named by the history service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    InvokeHostFunction,
    CreateAccount,
    Payment,
    ChangeTrust,
    #[serde(other)]
    Other,
}

/// Decoded parameter of a host-function operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationParameter {
    /// `ScVal` type name (`Address`, `Sym`, `U64`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Base64 `ScVal`, or an already-rendered value
    pub value: String,
}

/// An operation record belonging to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,

    #[serde(default)]
    pub source_account: Option<String>,

    /// Host function name, e.g. `HostFunctionTypeHostFunctionTypeInvokeContract`
    #[serde(default)]
    pub function: Option<String>,

    #[serde(default)]
    pub parameters: Vec<OperationParameter>,

    #[serde(default)]
    pub function_parameters_xdr: Option<String>,
}

impl RawOperation {
    /// Build an operation of the given kind with no details.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            source_account: None,
            function: None,
            parameters: Vec::new(),
            function_parameters_xdr: None,
        }
    }

    /// True for the "invoke contract" family of operations.
    pub fn is_contract_invocation(&self) -> bool {
        self.kind == OperationKind::InvokeHostFunction
    }

    /// True when the host function creates a contract rather than calling one.
    pub fn is_contract_creation(&self) -> bool {
        self.function
            .as_deref()
            .is_some_and(|f| f.contains("CreateContract"))
    }
}

/// A read-only contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub contract_id: String,
    pub function_name: String,
    pub args: Vec<ScArg>,
    /// Probe account paying the simulated fee; never a real party.
    pub fee_account: String,
}

/// Outcome of a simulated call.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationResult {
    /// The call executed and returned a value (JSON rendering of the `ScVal`).
    Success { decoded_value: Value },
    /// The call executed but the contract reported a domain-level negative.
    LogicalFailure { reason: String },
    /// The call could not be executed or its result could not be read.
    TransportFailure { error: LedgerError },
}

/// Trait abstraction for ledger operations.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch transactions touching `address`.
    async fn fetch_account_history(
        &self,
        address: &str,
        query: HistoryQuery,
    ) -> LedgerResult<Vec<RawTransaction>>;

    /// Fetch the operations of one transaction.
    async fn fetch_operations(&self, transaction_hash: &str) -> LedgerResult<Vec<RawOperation>>;

    /// Simulate a read-only invocation. Never fails; failures are folded
    /// into [`SimulationResult`].
    async fn simulate_read_call(&self, call: &ReadCall) -> SimulationResult;
}

/// Bound a ledger future by `limit`, mapping expiry to [`LedgerError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(limit)),
    }
}
