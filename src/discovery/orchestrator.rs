//! Discovery Orchestrator.
//!
//! Composes the ledger client, registry, extractor and verifier into the
//! discovery queries. Every per-item failure is caught at the item boundary
//! and recorded as a [`SkipReason`]; only invalid top-level input or a
//! failure of the very first ledger call fails the whole query.

use super::report::{BatchReport, DiscoveredContract, InteractedContract, MembershipMatch, SkipReason};
use super::{DiscoveryConfig, DiscoveryError, DiscoveryResult};
use crate::extract::{ExtractionStrategy, IdentifierExtractor, OperationDecodeStrategy};
use crate::ledger::{
    with_timeout, HistoryQuery, LedgerClient, LedgerError, RawOperation, RawTransaction,
};
use crate::membership::{Membership, MembershipVerifier, VerifierConfig};
use crate::registry::{ContractRecord, ContractRegistration, RegistryStore};
use crate::strkey;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type ItemOutcome<T> = (String, Result<T, SkipReason>);

/// Discovery entry point.
///
/// # Example
///
/// ```ignore
/// let orchestrator = DiscoveryOrchestrator::new(
///     Arc::new(HorizonLedgerClient::new(horizon_config)?),
///     Arc::new(RegistryStore::open("known-contracts.json")),
///     DiscoveryConfig::default(),
///     VerifierConfig::default(),
/// );
///
/// let cancel = CancellationToken::new();
/// let report = orchestrator.discover_membership_of(employee, &cancel).await?;
/// println!("{} contracts", report.len());
/// ```
pub struct DiscoveryOrchestrator<L: LedgerClient> {
    ledger: Arc<L>,
    registry: Arc<RegistryStore>,
    extractor: IdentifierExtractor,
    verifier: MembershipVerifier<L>,
    config: DiscoveryConfig,
}

impl<L: LedgerClient> DiscoveryOrchestrator<L> {
    pub fn new(
        ledger: Arc<L>,
        registry: Arc<RegistryStore>,
        config: DiscoveryConfig,
        verifier_config: VerifierConfig,
    ) -> Self {
        Self {
            verifier: MembershipVerifier::new(ledger.clone(), verifier_config),
            extractor: IdentifierExtractor::new(),
            ledger,
            registry,
            config,
        }
    }

    /// Replace the identifier extractor.
    pub fn with_extractor(mut self, extractor: IdentifierExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.registry
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Contracts found in the recent history of `wallet`.
    ///
    /// Reads the `history_limit` newest transactions, and for each successful
    /// one runs the extractor over its contract invocations. Candidates are
    /// returned newest first, one per invocation: the same contract may
    /// appear several times.
    pub async fn discover_deployed_by(
        &self,
        wallet: &str,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<BatchReport<DiscoveredContract>> {
        validate_party("wallet", wallet)?;
        cancellable(cancel, self.deployed_by(wallet)).await
    }

    /// Registry contracts `account` is confirmed to belong to.
    ///
    /// Contracts whose check is inconclusive (timeouts, transport errors,
    /// unexpected contract errors) are skipped, never reported as absent.
    pub async fn discover_membership_of(
        &self,
        account: &str,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<BatchReport<MembershipMatch>> {
        validate_party("employee", account)?;
        cancellable(cancel, self.membership_of(account)).await
    }

    /// Contracts `wallet` has invoked, de-duplicated by id.
    ///
    /// Reads the `scan_limit` newest transactions and only trusts addresses
    /// present on the operations themselves. Results are unverified.
    pub async fn scan_interactions(
        &self,
        wallet: &str,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<BatchReport<InteractedContract>> {
        validate_party("wallet", wallet)?;
        cancellable(cancel, self.interactions_of(wallet)).await
    }

    /// Write a discovered contract back into the registry.
    ///
    /// Only name and symbol recovered from the memo overwrite a registered
    /// record; the placeholder name and fallback symbol are used for new ids.
    pub fn promote(&self, contract: &DiscoveredContract) -> DiscoveryResult<ContractRecord> {
        let existing = self.registry.get(&contract.contract_id);

        let name = match &existing {
            Some(record) if !contract.company_name_recovered => record.display_name.clone(),
            _ => contract.company_name.clone(),
        };
        let token_symbol = (contract.token_symbol_recovered || existing.is_none())
            .then(|| contract.token_symbol.clone());

        let registration = ContractRegistration {
            token_symbol,
            token_contract: contract.token_contract_id.clone(),
            ..ContractRegistration::new(&contract.contract_id, name)
        };

        debug!(
            contract_id = %contract.contract_id,
            known = existing.is_some(),
            "promoting discovered contract"
        );
        Ok(self.registry.upsert(registration)?)
    }

    async fn deployed_by(&self, wallet: &str) -> DiscoveryResult<BatchReport<DiscoveredContract>> {
        let history = self.history(wallet, self.config.history_limit).await?;
        info!(wallet = %wallet, transactions = history.len(), "scanning history for contracts");

        let outcomes: Vec<Vec<ItemOutcome<DiscoveredContract>>> = stream::iter(&history)
            .map(|tx| self.candidates_in(wallet, tx))
            .buffered(self.config.max_concurrent_probes.max(1))
            .collect()
            .await;

        let mut report: BatchReport<DiscoveredContract> = BatchReport {
            examined: history.len(),
            ..BatchReport::default()
        };
        for (item, outcome) in outcomes.into_iter().flatten() {
            report.record(&item, outcome);
        }

        info!(
            wallet = %wallet,
            found = report.len(),
            skipped = report.skipped.len(),
            "history scan complete"
        );
        Ok(report)
    }

    async fn candidates_in(
        &self,
        wallet: &str,
        tx: &RawTransaction,
    ) -> Vec<ItemOutcome<DiscoveredContract>> {
        if !tx.successful {
            return vec![(tx.hash.clone(), Err(SkipReason::UnsuccessfulTransaction))];
        }

        let operations = match self.operations_of(tx).await {
            Ok(operations) => operations,
            Err(e) => {
                return vec![(
                    tx.hash.clone(),
                    Err(SkipReason::OperationsUnavailable {
                        error: e.to_string(),
                    }),
                )]
            }
        };

        operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_contract_invocation())
            .map(|(index, op)| {
                let outcome = self
                    .extractor
                    .extract(tx, op)
                    .map(|candidate| DiscoveredContract {
                        company_name_recovered: candidate.company_name.is_some(),
                        token_symbol_recovered: candidate.token_symbol.is_some(),
                        company_name: candidate
                            .company_name
                            .unwrap_or_else(|| placeholder_name(&candidate.contract_id)),
                        token_symbol: candidate
                            .token_symbol
                            .unwrap_or_else(|| self.config.fallback_token_symbol.clone()),
                        contract_id: candidate.contract_id,
                        token_contract_id: candidate.token_contract_id,
                        deployment_date: tx.created_at,
                        transaction_hash: tx.hash.clone(),
                        deployer_address: wallet.to_string(),
                        contract_type: candidate.contract_type,
                        strategy: candidate.strategy.to_string(),
                    })
                    .ok_or(SkipReason::NoCandidate { operation: index });
                (tx.hash.clone(), outcome)
            })
            .collect()
    }

    async fn membership_of(&self, account: &str) -> DiscoveryResult<BatchReport<MembershipMatch>> {
        let records = self.registry.list();
        info!(account = %account, contracts = records.len(), "checking registry membership");

        let outcomes: Vec<ItemOutcome<Option<MembershipMatch>>> = stream::iter(records)
            .map(|record| async move {
                let outcome = self.verify_record(account, &record).await;
                (record.id, outcome)
            })
            .buffered(self.config.max_concurrent_probes.max(1))
            .collect()
            .await;

        let mut report: BatchReport<MembershipMatch> = BatchReport {
            examined: outcomes.len(),
            ..BatchReport::default()
        };
        for (item, outcome) in outcomes {
            match outcome {
                Ok(Some(found)) => report.items.push(found),
                Ok(None) => debug!(contract_id = %item, "not a member"),
                Err(reason) => report.skip(&item, reason),
            }
        }

        info!(
            account = %account,
            found = report.len(),
            skipped = report.skipped.len(),
            "membership check complete"
        );
        Ok(report)
    }

    async fn verify_record(
        &self,
        account: &str,
        record: &ContractRecord,
    ) -> Result<Option<MembershipMatch>, SkipReason> {
        if !strkey::is_contract_address(&record.id) {
            return Err(SkipReason::InvalidContractId);
        }

        match self.verifier.check(account, &record.id).await {
            Ok(Membership::Registered { participant }) => Ok(Some(MembershipMatch {
                contract_id: record.id.clone(),
                company_name: record.display_name.clone(),
                token_symbol: record.token_symbol.clone(),
                token_contract: record.token_contract_id.clone(),
                last_checked: Utc::now(),
                network: self.config.network.clone(),
                participant,
            })),
            Ok(Membership::NotRegistered) => Ok(None),
            Err(e) => Err(SkipReason::Inconclusive {
                error: e.to_string(),
            }),
        }
    }

    async fn interactions_of(
        &self,
        wallet: &str,
    ) -> DiscoveryResult<BatchReport<InteractedContract>> {
        let history = self.history(wallet, self.config.scan_limit).await?;

        let mut report: BatchReport<InteractedContract> = BatchReport {
            examined: history.len(),
            ..BatchReport::default()
        };
        let (successful, failed): (Vec<&RawTransaction>, Vec<&RawTransaction>) =
            history.iter().partition(|tx| tx.successful);
        for tx in failed {
            report.skip(&tx.hash, SkipReason::UnsuccessfulTransaction);
        }

        let outcomes: Vec<(&RawTransaction, Result<Vec<RawOperation>, LedgerError>)> =
            stream::iter(successful)
                .map(|tx| async move { (tx, self.operations_of(tx).await) })
                .buffered(self.config.max_concurrent_probes.max(1))
                .collect()
                .await;

        let strategy = OperationDecodeStrategy;

        for (tx, operations) in outcomes {
            let operations = match operations {
                Ok(operations) => operations,
                Err(e) => {
                    report.skip(
                        &tx.hash,
                        SkipReason::OperationsUnavailable {
                            error: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            for op in operations.iter().filter(|op| op.is_contract_invocation()) {
                let Some(identity) = strategy.extract(tx, op) else {
                    continue;
                };
                // History is newest first, so the first sighting is the latest
                match report
                    .items
                    .iter_mut()
                    .find(|c| c.contract_id == identity.contract_id)
                {
                    Some(existing) => existing.interactions += 1,
                    None => report.items.push(InteractedContract {
                        contract_id: identity.contract_id,
                        last_interaction: tx.created_at,
                        transaction_hash: tx.hash.clone(),
                        interactions: 1,
                    }),
                }
            }
        }

        info!(
            wallet = %wallet,
            found = report.len(),
            skipped = report.skipped.len(),
            "interaction scan complete"
        );
        Ok(report)
    }

    /// Newest `limit` transactions of `address`; an unknown account has an
    /// empty history.
    async fn history(&self, address: &str, limit: u32) -> DiscoveryResult<Vec<RawTransaction>> {
        let query = HistoryQuery::newest(limit);
        match with_timeout(
            self.config.request_timeout,
            self.ledger.fetch_account_history(address, query),
        )
        .await
        {
            Ok(history) => Ok(history),
            Err(LedgerError::NotFound(_)) => {
                debug!(address = %address, "account not found, treating as empty history");
                Ok(Vec::new())
            }
            Err(e) => Err(DiscoveryError::Ledger(e)),
        }
    }

    async fn operations_of(&self, tx: &RawTransaction) -> Result<Vec<RawOperation>, LedgerError> {
        if !tx.operations.is_empty() {
            return Ok(tx.operations.clone());
        }
        with_timeout(
            self.config.request_timeout,
            self.ledger.fetch_operations(&tx.hash),
        )
        .await
    }
}

fn validate_party(field: &str, address: &str) -> DiscoveryResult<()> {
    if address.is_empty() {
        return Err(DiscoveryError::Validation(format!("{} address is required", field)));
    }
    if !strkey::is_party_address(address) {
        return Err(DiscoveryError::Validation(format!(
            "'{}' is not a valid {} address",
            address, field
        )));
    }
    Ok(())
}

/// Run `fut` unless `cancel` fires first; cancellation drops in-flight calls.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = DiscoveryResult<T>>,
) -> DiscoveryResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("discovery cancelled");
            Err(DiscoveryError::Cancelled)
        }
        result = fut => result,
    }
}

fn placeholder_name(contract_id: &str) -> String {
    let prefix: String = contract_id.chars().take(8).collect();
    format!("Contract {}...", prefix)
}
