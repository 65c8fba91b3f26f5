//! Ledger access for contract discovery.
//!
//! - Transaction history and operations (Horizon)
//! - Read-only contract simulation (Soroban RPC)
//! - Mock-friendly trait abstraction for testing

pub mod horizon;
pub mod mock;
pub mod traits;
pub mod xdr;

pub use horizon::{HorizonConfig, HorizonLedgerClient};
pub use mock::MockLedgerClient;
pub use traits::{
    with_timeout, HistoryQuery, LedgerClient, LedgerError, LedgerResult, OperationKind,
    OperationParameter, Order, RawOperation, RawTransaction, ReadCall, SimulationResult,
    MAX_PAGE_LIMIT,
};
pub use xdr::ScArg;
