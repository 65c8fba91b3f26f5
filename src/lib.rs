//! FairWage Discovery - payroll contract discovery and verification
//!
//! Lets an employer wallet find the payroll contracts it deployed, and an
//! employee wallet find the payroll contracts it is registered in, without
//! either side remembering contract ids.
//!
//! Key principles:
//! - Registry first: known contracts are named and probed directly
//! - History scan as fallback: contract identity recovered from raw transactions
//! - Read-only: membership is checked by simulation, nothing is signed or submitted
//! - Per-item failures are skipped and reported, never fatal to a batch

pub mod api;
pub mod discovery;
pub mod extract;
pub mod ledger;
pub mod membership;
pub mod registry;
pub mod strkey;
