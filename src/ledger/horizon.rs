//! Production ledger client.
//!
//! - History and operations come from Horizon's REST API
//! - Simulations go to Soroban RPC `simulateTransaction`, with an unsigned
//!   envelope sourced from the probe account
//!
//! Every request is bounded by the configured timeout; expiry surfaces as
//! [`LedgerError::Timeout`].

use super::traits::*;
use super::xdr::{decode_sc_val_base64, InvocationEnvelope};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection settings for [`HorizonLedgerClient`].
#[derive(Debug, Clone)]
pub struct HorizonConfig {
    pub horizon_url: Url,
    pub rpc_url: Url,
    pub request_timeout: Duration,
    /// Fee (stroops) written into simulated envelopes.
    pub base_fee: u32,
}

/// Ledger client over Horizon + Soroban RPC.
pub struct HorizonLedgerClient {
    http: Client,
    horizon_url: Url,
    rpc_url: Url,
    request_timeout: Duration,
    base_fee: u32,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

#[derive(Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

#[derive(Deserialize)]
struct AccountRecord {
    sequence: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<SimulateResponse>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct SimulateResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<HostFunctionResult>,
}

#[derive(Deserialize)]
struct HostFunctionResult {
    xdr: String,
}

impl HorizonLedgerClient {
    /// Create a client with its own connection pool.
    pub fn new(config: HorizonConfig) -> LedgerResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LedgerError::Http(e.to_string()))?;

        Ok(Self {
            http,
            horizon_url: config.horizon_url,
            rpc_url: config.rpc_url,
            request_timeout: config.request_timeout,
            base_fee: config.base_fee,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> LedgerResult<Url> {
        let mut url = self.horizon_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| LedgerError::Encoding("Horizon URL cannot be a base".to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn transport_error(&self, error: reqwest::Error) -> LedgerError {
        if error.is_timeout() {
            LedgerError::Timeout(self.request_timeout)
        } else {
            LedgerError::Http(error.to_string())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> LedgerResult<T> {
        debug!(url = %url, "ledger GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound(url.path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn load_sequence(&self, account: &str) -> LedgerResult<i64> {
        let url = self.endpoint(&["accounts", account])?;
        let record: AccountRecord = self.get_json(url).await?;
        record
            .sequence
            .parse::<i64>()
            .map_err(|e| LedgerError::Decode(format!("account sequence: {}", e)))
    }

    async fn simulate(&self, call: &ReadCall) -> LedgerResult<SimulationResult> {
        let sequence = self.load_sequence(&call.fee_account).await?;

        let envelope = InvocationEnvelope {
            source_account: &call.fee_account,
            sequence: sequence.saturating_add(1),
            fee: self.base_fee,
            contract_id: &call.contract_id,
            function_name: &call.function_name,
            args: &call.args,
        }
        .to_base64()
        .map_err(|e| LedgerError::Encoding(e.to_string()))?;

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "simulateTransaction",
            "params": { "transaction": envelope },
        });

        debug!(
            contract_id = %call.contract_id,
            function = %call.function_name,
            "simulating read call"
        );

        let response = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if let Some(error) = rpc.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = rpc
            .result
            .ok_or_else(|| LedgerError::Decode("simulation response has no result".to_string()))?;

        if let Some(reason) = result.error {
            return Ok(SimulationResult::LogicalFailure { reason });
        }

        let decoded_value = match result.results.first() {
            Some(host_result) => decode_sc_val_base64(&host_result.xdr)
                .map_err(|e| LedgerError::Decode(format!("return value: {}", e)))?,
            None => Value::Null,
        };

        Ok(SimulationResult::Success { decoded_value })
    }
}

#[async_trait]
impl LedgerClient for HorizonLedgerClient {
    async fn fetch_account_history(
        &self,
        address: &str,
        query: HistoryQuery,
    ) -> LedgerResult<Vec<RawTransaction>> {
        let mut url = self.endpoint(&["accounts", address, "transactions"])?;
        url.query_pairs_mut()
            .append_pair("order", query.order.as_str())
            .append_pair("limit", &query.limit().to_string());

        let page: Page<RawTransaction> = self.get_json(url).await?;
        Ok(page.embedded.records)
    }

    async fn fetch_operations(&self, transaction_hash: &str) -> LedgerResult<Vec<RawOperation>> {
        let mut url = self.endpoint(&["transactions", transaction_hash, "operations"])?;
        url.query_pairs_mut()
            .append_pair("limit", &MAX_PAGE_LIMIT.to_string());

        let page: Page<RawOperation> = self.get_json(url).await?;
        Ok(page.embedded.records)
    }

    async fn simulate_read_call(&self, call: &ReadCall) -> SimulationResult {
        match self.simulate(call).await {
            Ok(result) => result,
            Err(error) => SimulationResult::TransportFailure { error },
        }
    }
}
