//! Known-contract registry.

pub mod store;

pub use store::{ContractRecord, ContractRegistration, RegistryError, RegistryResult, RegistryStore};
