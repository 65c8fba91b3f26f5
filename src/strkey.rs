//! Stellar address handling.
//!
//! Two levels of checking are provided:
//! - **Shape**: cheap regex checks used before any network call
//!   (`C` + 55 characters for contracts, `G` + 55 base32 characters for accounts)
//! - **StrKey**: full decoding through `stellar-strkey`, needed when an
//!   address has to be written into an XDR payload
//!
//! A shape-valid id is not necessarily a decodable one (`"C" + "A" * 55`
//! passes the shape check but fails the checksum).

use regex::Regex;
use stellar_strkey::{ed25519, Contract, Strkey};
use std::sync::OnceLock;
use thiserror::Error;

/// Length of every encoded account or contract address.
pub const ADDRESS_LEN: usize = 56;

static CONTRACT_SHAPE: OnceLock<Regex> = OnceLock::new();
static ACCOUNT_SHAPE: OnceLock<Regex> = OnceLock::new();

/// StrKey decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrKeyError {
    #[error("'{0}' is not a valid strkey")]
    Invalid(String),

    #[error("expected {expected} address, found {address}")]
    WrongKind {
        expected: &'static str,
        address: String,
    },
}

/// Returns true if `value` has the shape of a contract address (`^C[A-Za-z0-9]{55}$`).
pub fn is_contract_address(value: &str) -> bool {
    CONTRACT_SHAPE
        .get_or_init(|| Regex::new(r"^C[A-Za-z0-9]{55}$").expect("static regex"))
        .is_match(value)
}

/// Returns true if `value` has the shape of an account address (`^G[A-Z2-7]{55}$`).
pub fn is_account_address(value: &str) -> bool {
    ACCOUNT_SHAPE
        .get_or_init(|| Regex::new(r"^G[A-Z2-7]{55}$").expect("static regex"))
        .is_match(value)
}

/// Returns true for anything that may legitimately appear as a party in a query.
pub fn is_party_address(value: &str) -> bool {
    is_account_address(value) || is_contract_address(value)
}

/// Encode a 32-byte contract id as a `C...` address.
pub fn encode_contract(id: &[u8; 32]) -> String {
    Contract(*id).to_string()
}

/// Encode a 32-byte ed25519 public key as a `G...` address.
pub fn encode_account(key: &[u8; 32]) -> String {
    ed25519::PublicKey(*key).to_string()
}

/// Decode a `C...` address into its 32-byte contract id.
pub fn decode_contract(address: &str) -> Result<[u8; 32], StrKeyError> {
    match parse(address)? {
        Strkey::Contract(Contract(id)) => Ok(id),
        _ => Err(StrKeyError::WrongKind {
            expected: "contract",
            address: address.to_string(),
        }),
    }
}

/// Decode a `G...` address into its 32-byte public key.
pub fn decode_account(address: &str) -> Result<[u8; 32], StrKeyError> {
    match parse(address)? {
        Strkey::PublicKeyEd25519(ed25519::PublicKey(key)) => Ok(key),
        _ => Err(StrKeyError::WrongKind {
            expected: "account",
            address: address.to_string(),
        }),
    }
}

fn parse(address: &str) -> Result<Strkey, StrKeyError> {
    Strkey::from_string(address).map_err(|_| StrKeyError::Invalid(address.to_string()))
}
