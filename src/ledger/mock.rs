//! Mock ledger client for testing.
//!
//! Responses are stubbed per address / transaction / (contract, account)
//! pair, and every call is counted so tests can assert that a code path
//! never reached the network.

use super::traits::*;
use super::xdr::ScArg;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock ledger client for testing.
#[derive(Clone, Default)]
pub struct MockLedgerClient {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    histories: HashMap<String, LedgerResult<Vec<RawTransaction>>>,
    operations: HashMap<String, LedgerResult<Vec<RawOperation>>>,
    simulations: HashMap<(String, String), SimulationResult>,
    simulation_delays: HashMap<String, Duration>,
    history_calls: usize,
    operation_calls: usize,
    simulate_calls: Vec<ReadCall>,
}

impl MockLedgerClient {
    /// Create new mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub the history of `address`.
    pub fn put_history(&self, address: &str, transactions: Vec<RawTransaction>) {
        let mut s = self.state.lock().unwrap();
        s.histories.insert(address.to_string(), Ok(transactions));
    }

    /// Make the history fetch of `address` fail.
    pub fn fail_history(&self, address: &str, error: LedgerError) {
        let mut s = self.state.lock().unwrap();
        s.histories.insert(address.to_string(), Err(error));
    }

    /// Stub the operations of a transaction.
    pub fn put_operations(&self, transaction_hash: &str, operations: Vec<RawOperation>) {
        let mut s = self.state.lock().unwrap();
        s.operations
            .insert(transaction_hash.to_string(), Ok(operations));
    }

    /// Make the operations fetch of a transaction fail.
    pub fn fail_operations(&self, transaction_hash: &str, error: LedgerError) {
        let mut s = self.state.lock().unwrap();
        s.operations
            .insert(transaction_hash.to_string(), Err(error));
    }

    /// Stub the simulation outcome for `account` in `contract_id`.
    pub fn put_simulation(&self, contract_id: &str, account: &str, result: SimulationResult) {
        let mut s = self.state.lock().unwrap();
        s.simulations
            .insert((contract_id.to_string(), account.to_string()), result);
    }

    /// Delay every simulation against `contract_id`.
    pub fn delay_simulation(&self, contract_id: &str, delay: Duration) {
        let mut s = self.state.lock().unwrap();
        s.simulation_delays.insert(contract_id.to_string(), delay);
    }

    /// Number of history fetches made.
    pub fn history_calls(&self) -> usize {
        self.state.lock().unwrap().history_calls
    }

    /// Number of operation fetches made.
    pub fn operation_calls(&self) -> usize {
        self.state.lock().unwrap().operation_calls
    }

    /// Number of simulations made.
    pub fn simulate_calls(&self) -> usize {
        self.state.lock().unwrap().simulate_calls.len()
    }

    /// Every simulated call, in order.
    pub fn simulated(&self) -> Vec<ReadCall> {
        self.state.lock().unwrap().simulate_calls.clone()
    }
}

fn first_address(call: &ReadCall) -> String {
    match call.args.first() {
        Some(ScArg::Address(address)) => address.clone(),
        _ => String::new(),
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn fetch_account_history(
        &self,
        address: &str,
        query: HistoryQuery,
    ) -> LedgerResult<Vec<RawTransaction>> {
        let mut s = self.state.lock().unwrap();
        s.history_calls += 1;
        match s.histories.get(address) {
            Some(Ok(transactions)) => {
                let mut transactions = transactions.clone();
                if query.order == Order::Asc {
                    transactions.reverse();
                }
                transactions.truncate(query.limit() as usize);
                Ok(transactions)
            }
            Some(Err(e)) => Err(e.clone()),
            None => Err(LedgerError::NotFound(address.to_string())),
        }
    }

    async fn fetch_operations(&self, transaction_hash: &str) -> LedgerResult<Vec<RawOperation>> {
        let mut s = self.state.lock().unwrap();
        s.operation_calls += 1;
        s.operations
            .get(transaction_hash)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn simulate_read_call(&self, call: &ReadCall) -> SimulationResult {
        let (delay, result) = {
            let mut s = self.state.lock().unwrap();
            s.simulate_calls.push(call.clone());
            let key = (call.contract_id.clone(), first_address(call));
            let result = s.simulations.get(&key).cloned().unwrap_or_else(|| {
                SimulationResult::TransportFailure {
                    error: LedgerError::Http(format!("no stub for {}", call.contract_id)),
                }
            });
            (s.simulation_delays.get(&call.contract_id).copied(), result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn tx(hash: &str) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            successful: true,
            created_at: Utc::now(),
            memo: None,
            memo_type: None,
            envelope_xdr: String::new(),
            result_xdr: String::new(),
            result_meta_xdr: None,
            operations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_history_respects_query() {
        let client = MockLedgerClient::new();
        client.put_history("G1", vec![tx("newest"), tx("middle"), tx("oldest")]);

        let newest = client
            .fetch_account_history("G1", HistoryQuery::newest(2))
            .await
            .unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].hash, "newest");

        let oldest = client
            .fetch_account_history("G1", HistoryQuery::new(Order::Asc, 1))
            .await
            .unwrap();
        assert_eq!(oldest[0].hash, "oldest");
        assert_eq!(client.history_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_unknown_history_is_not_found() {
        let client = MockLedgerClient::new();
        let result = client
            .fetch_account_history("G-unknown", HistoryQuery::newest(10))
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mock_simulation_stub_and_count() {
        let client = MockLedgerClient::new();
        client.put_simulation(
            "C1",
            "G1",
            SimulationResult::Success {
                decoded_value: json!({"active": true}),
            },
        );

        let call = ReadCall {
            contract_id: "C1".to_string(),
            function_name: "get_employee_info".to_string(),
            args: vec![ScArg::Address("G1".to_string())],
            fee_account: "GPROBE".to_string(),
        };

        let result = client.simulate_read_call(&call).await;
        assert!(matches!(result, SimulationResult::Success { .. }));

        let other = ReadCall {
            contract_id: "C2".to_string(),
            ..call.clone()
        };
        let result = client.simulate_read_call(&other).await;
        assert!(matches!(result, SimulationResult::TransportFailure { .. }));

        assert_eq!(client.simulate_calls(), 2);
        assert_eq!(client.simulated()[0], call);
    }
}
