//! Contract Registry - durable set of contracts known by name.
//!
//! The registry is the source for employee membership scans: every payroll
//! contract an employer registers (or that discovery promotes) lands here,
//! so an employee lookup only has to probe a small, known set.
//!
//! ## Semantics
//!
//! - **Merge-by-id**: re-registering an id overwrites only the fields the
//!   incoming registration carries
//! - **Soft delete**: records are never removed, only deactivated
//! - **Best-effort durability**: every mutation is persisted synchronously;
//!   a failed write is reported but the in-memory change stands
//! - **Single writer**: mutations serialize on a write lock, reads run
//!   concurrently when no writer is in flight

use crate::strkey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to persist registry to '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A registered contract.
///
/// Serialized as `{id, name, tokenSymbol, tokenContract, active}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Contract address (`C...`), the record identity
    pub id: String,

    /// Display name (company name)
    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(rename = "tokenSymbol", default)]
    pub token_symbol: String,

    /// Token contract used for payouts
    #[serde(rename = "tokenContract", default, skip_serializing_if = "Option::is_none")]
    pub token_contract_id: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Incoming registration; absent fields leave existing values untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRegistration {
    pub id: Option<String>,
    pub name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_contract: Option<String>,
    pub active: Option<bool>,
}

impl ContractRegistration {
    /// Registration with the two required fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn token_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.token_symbol = Some(symbol.into());
        self
    }

    pub fn token_contract(mut self, contract: impl Into<String>) -> Self {
        self.token_contract = Some(contract.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    fn validated(&self) -> RegistryResult<(&str, &str)> {
        let id = self
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RegistryError::Validation("contract must have an id".to_string()))?;
        let name = self
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| RegistryError::Validation("contract must have a name".to_string()))?;

        if !strkey::is_contract_address(id) {
            return Err(RegistryError::Validation(format!(
                "'{}' is not a contract address",
                id
            )));
        }

        Ok((id, name))
    }

    /// Shallow merge onto an existing record.
    fn merge_into(&self, record: &mut ContractRecord) {
        if let Some(name) = &self.name {
            record.display_name = name.clone();
        }
        if let Some(symbol) = &self.token_symbol {
            record.token_symbol = symbol.clone();
        }
        if let Some(contract) = &self.token_contract {
            record.token_contract_id = Some(contract.clone());
        }
        if let Some(active) = self.active {
            record.active = active;
        }
    }
}

/// File-backed contract registry.
///
/// # Example
///
/// ```ignore
/// let store = RegistryStore::open("known-contracts.json");
/// store.upsert(ContractRegistration::new(contract_id, "Acme").token_symbol("ACM"))?;
/// let active = store.list();
/// ```
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    records: RwLock<Vec<ContractRecord>>,
}

impl RegistryStore {
    /// Open the registry at `path`, loading whatever is there.
    ///
    /// A missing or unreadable file yields an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            records: RwLock::new(Vec::new()),
        };
        store.load();
        store
    }

    /// Location of the durable file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from the durable file.
    ///
    /// # Returns
    ///
    /// Number of records now held. A successful read replaces the in-memory
    /// set wholesale; a missing or corrupt file leaves the registry empty.
    pub fn load(&self) -> usize {
        let loaded = match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Vec<ContractRecord>>(&contents) {
                Ok(records) => {
                    info!(
                        path = %self.path.display(),
                        count = records.len(),
                        "loaded contract registry"
                    );
                    records
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "corrupt registry file, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no registry file, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable registry file, starting empty");
                Vec::new()
            }
        };

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *records = dedupe(loaded);
        records.len()
    }

    /// All active records, in registration order.
    pub fn list(&self) -> Vec<ContractRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.active)
            .cloned()
            .collect()
    }

    /// Look up a record by id, active or not.
    pub fn get(&self, id: &str) -> Option<ContractRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Number of active records.
    pub fn active_count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.active)
            .count()
    }

    /// Register or update a contract.
    ///
    /// # Semantics
    ///
    /// - `id` and `name` are required, `id` must be contract-shaped
    /// - Existing id: incoming fields override, absent fields are preserved
    /// - New id: appended, `active` defaults to `true`
    /// - Persisted before returning
    ///
    /// # Returns
    ///
    /// The stored record. On a persistence failure the error is returned but
    /// the in-memory mutation is kept.
    pub fn upsert(&self, registration: ContractRegistration) -> RegistryResult<ContractRecord> {
        let (id, name) = registration.validated()?;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let stored = match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                registration.merge_into(existing);
                existing.clone()
            }
            None => {
                let record = ContractRecord {
                    id: id.to_string(),
                    display_name: name.to_string(),
                    token_symbol: registration.token_symbol.clone().unwrap_or_default(),
                    token_contract_id: registration.token_contract.clone(),
                    active: registration.active.unwrap_or(true),
                };
                records.push(record.clone());
                record
            }
        };

        info!(
            contract_id = %stored.id,
            name = %stored.display_name,
            active = stored.active,
            "contract registry updated"
        );

        self.write_locked(&records)?;
        Ok(stored)
    }

    /// Deactivate a contract so it no longer appears in listings.
    ///
    /// # Returns
    ///
    /// `true` if the id was known.
    pub fn deactivate(&self, id: &str) -> RegistryResult<bool> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.active = false;
        info!(contract_id = %id, "contract deactivated");

        self.write_locked(&records)?;
        Ok(true)
    }

    /// Write the current set to the durable file.
    pub fn persist(&self) -> RegistryResult<()> {
        // Write lock even for a read: keeps file writes single-writer
        let records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        self.write_locked(&records)
    }

    fn write_locked(&self, records: &[ContractRecord]) -> RegistryResult<()> {
        let contents = serde_json::to_string_pretty(records)?;

        let result = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&self.path, contents));

        result.map_err(|source| {
            error!(path = %self.path.display(), error = %source, "failed to persist registry");
            RegistryError::Persist {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Collapse duplicate ids, later entries merging over earlier ones.
///
/// Empty names and symbols and absent token contracts in a later entry
/// keep the earlier value; `active` is always taken from the later entry.
fn dedupe(records: Vec<ContractRecord>) -> Vec<ContractRecord> {
    let mut out: Vec<ContractRecord> = Vec::with_capacity(records.len());
    for record in records {
        match out.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => merge_record(existing, record),
            None => out.push(record),
        }
    }
    out
}

fn merge_record(existing: &mut ContractRecord, later: ContractRecord) {
    if !later.display_name.is_empty() {
        existing.display_name = later.display_name;
    }
    if !later.token_symbol.is_empty() {
        existing.token_symbol = later.token_symbol;
    }
    if later.token_contract_id.is_some() {
        existing.token_contract_id = later.token_contract_id;
    }
    existing.active = later.active;
}
