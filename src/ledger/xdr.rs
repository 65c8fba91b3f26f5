//! Adapters between ledger XDR payloads and this crate's types.
//!
//! Decoding and encoding are done by `stellar-xdr`; this module only maps
//! the few shapes discovery cares about:
//! - `ScVal` into JSON (simulation return values, operation parameters)
//! - the return value of a successful invocation, read from the
//!   transaction meta
//! - contract addresses referenced by the invocations in an envelope
//! - the unsigned single-operation envelope sent for simulation
//!
//! An `InvokeHostFunction` success result only carries a hash of the
//! return value and events. The value itself lives in
//! `SorobanTransactionMeta`, so nothing here reads an address out of a
//! result alone.

use crate::strkey::{self, StrKeyError};
use serde_json::{Map, Value};
use stellar_xdr::curr::{
    AccountId, Hash, HostFunction, InvokeContractArgs, InvokeHostFunctionOp,
    InvokeHostFunctionResult, Limits, Memo, MuxedAccount, Operation, OperationBody,
    OperationResult, OperationResultTr, Preconditions, PublicKey, ReadXdr, ScAddress, ScError,
    ScSymbol, ScVal, SequenceNumber, Transaction, TransactionEnvelope, TransactionExt,
    TransactionMeta, TransactionResult, TransactionResultResult, TransactionV1Envelope, Uint256,
    VecM, WriteXdr,
};
use stellar_xdr::curr::InnerTransactionResultResult;
use thiserror::Error;

/// Maximum nesting accepted when decoding.
const MAX_DEPTH: u32 = 32;

/// Upper bound on decoded bytes per payload.
const MAX_LENGTH: usize = 1 << 20;

/// XDR adapter errors.
#[derive(Debug, Error)]
pub enum XdrError {
    #[error("xdr: {0}")]
    Codec(#[from] stellar_xdr::curr::Error),

    #[error("address: {0}")]
    Address(#[from] StrKeyError),
}

pub type XdrResult<T> = Result<T, XdrError>;

fn limits() -> Limits {
    Limits {
        depth: MAX_DEPTH,
        len: MAX_LENGTH,
    }
}

fn decode<T: ReadXdr>(encoded: &str) -> XdrResult<T> {
    Ok(T::from_xdr_base64(encoded.trim(), limits())?)
}

/// Argument to a read-only contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScArg {
    /// Account (`G...`) or contract (`C...`) address.
    Address(String),
    /// Short symbol, e.g. a function or field name.
    Symbol(String),
}

impl ScArg {
    pub fn to_sc_val(&self) -> XdrResult<ScVal> {
        Ok(match self {
            ScArg::Address(address) => ScVal::Address(sc_address(address)?),
            ScArg::Symbol(symbol) => ScVal::Symbol(ScSymbol(symbol.as_bytes().to_vec().try_into()?)),
        })
    }
}

/// Parse a `G...` or `C...` strkey into an `ScAddress`.
pub fn sc_address(address: &str) -> XdrResult<ScAddress> {
    if address.starts_with('C') {
        Ok(ScAddress::Contract(Hash(strkey::decode_contract(address)?)))
    } else {
        let key = strkey::decode_account(address)?;
        Ok(ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(
            Uint256(key),
        ))))
    }
}

/// Render an `ScAddress` as its strkey.
pub fn address_to_string(address: &ScAddress) -> String {
    match address {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))) => {
            strkey::encode_account(key)
        }
        ScAddress::Contract(Hash(id)) => strkey::encode_contract(id),
    }
}

/// Decode a base64 `ScVal` into its JSON rendering.
pub fn decode_sc_val_base64(encoded: &str) -> XdrResult<Value> {
    let value: ScVal = decode(encoded)?;
    Ok(sc_val_to_json(&value))
}

/// JSON rendering of an `ScVal`.
///
/// Maps become JSON objects (non-string keys are stringified), 128/256-bit
/// integers become decimal/hex strings, bytes become hex, addresses become
/// strkeys.
pub fn sc_val_to_json(value: &ScVal) -> Value {
    match value {
        ScVal::Bool(b) => Value::Bool(*b),
        ScVal::Void | ScVal::LedgerKeyContractInstance | ScVal::ContractInstance(_) => Value::Null,
        ScVal::Error(error) => sc_error_to_json(error),
        ScVal::U32(n) => Value::from(*n),
        ScVal::I32(n) => Value::from(*n),
        ScVal::U64(n) => Value::from(*n),
        ScVal::I64(n) => Value::from(*n),
        ScVal::Timepoint(t) => Value::from(t.0),
        ScVal::Duration(d) => Value::from(d.0),
        ScVal::U128(parts) => {
            Value::String((((parts.hi as u128) << 64) | parts.lo as u128).to_string())
        }
        ScVal::I128(parts) => {
            Value::String((((parts.hi as i128) << 64) | parts.lo as i128).to_string())
        }
        ScVal::U256(parts) => wide_hex([parts.hi_hi, parts.hi_lo, parts.lo_hi, parts.lo_lo]),
        ScVal::I256(parts) => {
            wide_hex([parts.hi_hi as u64, parts.hi_lo, parts.lo_hi, parts.lo_lo])
        }
        ScVal::Bytes(bytes) => Value::String(hex::encode(bytes.0.as_slice())),
        ScVal::String(s) => Value::String(String::from_utf8_lossy(s.0.as_slice()).into_owned()),
        ScVal::Symbol(s) => Value::String(String::from_utf8_lossy(s.0.as_slice()).into_owned()),
        ScVal::Vec(None) | ScVal::Map(None) => Value::Null,
        ScVal::Vec(Some(items)) => Value::Array(items.0.iter().map(sc_val_to_json).collect()),
        ScVal::Map(Some(entries)) => {
            let mut map = Map::new();
            for entry in entries.0.iter() {
                let key = match sc_val_to_json(&entry.key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, sc_val_to_json(&entry.val));
            }
            Value::Object(map)
        }
        ScVal::Address(address) => Value::String(address_to_string(address)),
        ScVal::LedgerKeyNonce(nonce) => Value::from(nonce.nonce),
    }
}

fn sc_error_to_json(error: &ScError) -> Value {
    let inner = match error {
        ScError::Contract(code) => serde_json::json!({"type": "contract", "code": code}),
        other => serde_json::json!({"type": format!("{:?}", other)}),
    };
    serde_json::json!({ "error": inner })
}

fn wide_hex(words: [u64; 4]) -> Value {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    Value::String(format!("0x{}", hex::encode(bytes)))
}

/// True when a base64 `TransactionResult` holds at least one successful
/// `InvokeHostFunction` operation (fee-bump inner results included).
pub fn invocation_succeeded(result_base64: &str) -> XdrResult<bool> {
    let result: TransactionResult = decode(result_base64)?;
    let operations: &[OperationResult] = match &result.result {
        TransactionResultResult::TxSuccess(ops) => ops.as_slice(),
        TransactionResultResult::TxFeeBumpInnerSuccess(pair) => match &pair.result.result {
            InnerTransactionResultResult::TxSuccess(ops) => ops.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    Ok(operations.iter().any(|op| {
        matches!(
            op,
            OperationResult::OpInner(OperationResultTr::InvokeHostFunction(
                InvokeHostFunctionResult::Success(_)
            ))
        )
    }))
}

/// The value returned by the transaction's host-function invocation, read
/// from a base64 `TransactionMeta`. `None` for metas without Soroban data.
pub fn returned_value(meta_base64: &str) -> XdrResult<Option<ScVal>> {
    let meta: TransactionMeta = decode(meta_base64)?;
    Ok(match meta {
        TransactionMeta::V3(v3) => v3.soroban_meta.map(|soroban| soroban.return_value),
        _ => None,
    })
}

/// The contract address returned by a successful invocation, e.g. the id
/// of a freshly created contract.
///
/// Declines (`Ok(None)`) unless the result reports an invocation success
/// and the meta's return value is a contract address.
pub fn returned_contract_address(
    result_base64: &str,
    meta_base64: &str,
) -> XdrResult<Option<String>> {
    if !invocation_succeeded(result_base64)? {
        return Ok(None);
    }
    Ok(match returned_value(meta_base64)? {
        Some(ScVal::Address(address @ ScAddress::Contract(_))) => {
            Some(address_to_string(&address))
        }
        _ => None,
    })
}

/// Contract addresses referenced by the `InvokeContract` operations of a
/// base64 `TransactionEnvelope`: each invoked contract, then the contract
/// addresses among its arguments. Order of appearance, de-duplicated.
pub fn envelope_contract_addresses(envelope_base64: &str) -> XdrResult<Vec<String>> {
    let envelope: TransactionEnvelope = decode(envelope_base64)?;
    let operations: &[Operation] = match &envelope {
        TransactionEnvelope::TxV0(env) => env.tx.operations.as_slice(),
        TransactionEnvelope::Tx(env) => env.tx.operations.as_slice(),
        TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
            stellar_xdr::curr::FeeBumpTransactionInnerTx::Tx(inner) => {
                inner.tx.operations.as_slice()
            }
        },
    };

    let mut found = Vec::new();
    for op in operations {
        if let OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(args),
            ..
        }) = &op.body
        {
            collect_invocation(args, &mut found);
        }
    }
    Ok(found)
}

/// Contract addresses inside a base64 function-parameter payload, which
/// may be a single `ScVal` or a whole `InvokeContractArgs`.
pub fn parameter_contract_addresses(encoded: &str) -> Vec<String> {
    let mut found = Vec::new();
    if let Ok(value) = decode::<ScVal>(encoded) {
        collect_sc_val(&value, &mut found);
    } else if let Ok(args) = decode::<InvokeContractArgs>(encoded) {
        collect_invocation(&args, &mut found);
    }
    found
}

fn collect_invocation(args: &InvokeContractArgs, found: &mut Vec<String>) {
    if let ScAddress::Contract(_) = &args.contract_address {
        push_unique(found, address_to_string(&args.contract_address));
    }
    for arg in args.args.iter() {
        collect_sc_val(arg, found);
    }
}

fn collect_sc_val(value: &ScVal, found: &mut Vec<String>) {
    match value {
        ScVal::Address(address @ ScAddress::Contract(_)) => {
            push_unique(found, address_to_string(address))
        }
        ScVal::Vec(Some(items)) => items.0.iter().for_each(|item| collect_sc_val(item, found)),
        ScVal::Map(Some(entries)) => {
            for entry in entries.0.iter() {
                collect_sc_val(&entry.key, found);
                collect_sc_val(&entry.val, found);
            }
        }
        _ => {}
    }
}

fn push_unique(found: &mut Vec<String>, address: String) {
    if !found.contains(&address) {
        found.push(address);
    }
}

/// Unsigned single-operation invocation used for simulation.
#[derive(Debug, Clone)]
pub struct InvocationEnvelope<'a> {
    /// Fee-paying source account (`G...`).
    pub source_account: &'a str,
    /// Sequence number the transaction would consume.
    pub sequence: i64,
    /// Base fee in stroops.
    pub fee: u32,
    /// Contract to invoke (`C...`).
    pub contract_id: &'a str,
    pub function_name: &'a str,
    pub args: &'a [ScArg],
}

impl InvocationEnvelope<'_> {
    pub fn to_envelope(&self) -> XdrResult<TransactionEnvelope> {
        let source = strkey::decode_account(self.source_account)?;
        let args = self
            .args
            .iter()
            .map(ScArg::to_sc_val)
            .collect::<XdrResult<Vec<_>>>()?;

        let invoke = InvokeContractArgs {
            contract_address: ScAddress::Contract(Hash(strkey::decode_contract(self.contract_id)?)),
            function_name: ScSymbol(self.function_name.as_bytes().to_vec().try_into()?),
            args: args.try_into()?,
        };
        let operation = Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(invoke),
                auth: VecM::default(),
            }),
        };

        let tx = Transaction {
            source_account: MuxedAccount::Ed25519(Uint256(source)),
            fee: self.fee,
            seq_num: SequenceNumber(self.sequence),
            cond: Preconditions::None,
            memo: Memo::None,
            operations: vec![operation].try_into()?,
            ext: TransactionExt::V0,
        };

        Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
            tx,
            signatures: VecM::default(),
        }))
    }

    /// Encode as a base64 `TransactionEnvelope` (v1, no signatures).
    pub fn to_base64(&self) -> XdrResult<String> {
        Ok(self.to_envelope()?.to_xdr_base64(Limits::none())?)
    }
}


#[cfg(test)]
mod tests {
    use super::test_vectors::*;
    use super::*;
    use stellar_xdr::curr::{Int128Parts, ScVec};

    const REGISTERED_CONTRACT: &str = "CDCSZPH46V3CL7HWMQO6JIZO5VKIZVG2LKOJ3WX2ZAUGVJ4RI5D43GPU";
    const PROBE_ACCOUNT: &str = "GBIFUPL4MOPI5XHPFKYO4SWTKKLSK63GZVMQ5A2FX3TLCS74NJ55QAZD";

    fn encode(value: &ScVal) -> String {
        value.to_xdr_base64(Limits::none()).unwrap()
    }

    #[test]
    fn test_decode_participant_map() {
        let value = decode_sc_val_base64(&participant_map(Some(false), 42)).unwrap();
        assert_eq!(value["active"], Value::Bool(false));
        assert_eq!(value["wage_rate"], Value::from(42u64));

        let value = decode_sc_val_base64(&participant_map(None, 7)).unwrap();
        assert!(value.get("active").is_none());
    }

    #[test]
    fn test_decode_contract_address_value() {
        let id = strkey::decode_contract(REGISTERED_CONTRACT).unwrap();
        let value = decode_sc_val_base64(&contract_address_sc_val(&id)).unwrap();
        assert_eq!(value, Value::String(REGISTERED_CONTRACT.to_string()));
    }

    #[test]
    fn test_decode_i128_and_void() {
        let value = sc_val_to_json(&ScVal::I128(Int128Parts {
            hi: -1,
            lo: u64::MAX - 4,
        }));
        assert_eq!(value, Value::String("-5".to_string()));
        assert_eq!(sc_val_to_json(&ScVal::Void), Value::Null);
    }

    #[test]
    fn test_decode_contract_error() {
        let value = sc_val_to_json(&ScVal::Error(ScError::Contract(4)));
        assert_eq!(value["error"]["code"], Value::from(4u32));
        assert_eq!(value["error"]["type"], "contract");
    }

    #[test]
    fn test_decode_rejects_deep_nesting() {
        let mut value = ScVal::Void;
        for _ in 0..(MAX_DEPTH + 2) {
            value = ScVal::Vec(Some(ScVec(vec![value].try_into().unwrap())));
        }
        assert!(matches!(
            decode_sc_val_base64(&encode(&value)),
            Err(XdrError::Codec(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_sc_val_base64("not base64!").is_err());
        assert!(decode_sc_val_base64("AAAA").is_err());
    }

    #[test]
    fn test_invocation_success_detection() {
        assert!(invocation_succeeded(&invoke_success_result(&[7u8; 32])).unwrap());
        assert!(invocation_succeeded(&fee_bump_invoke_success_result(&[9u8; 32])).unwrap());
        assert!(!invocation_succeeded(&payment_result()).unwrap());
        assert!(invocation_succeeded("not base64!").is_err());
    }

    #[test]
    fn test_success_hash_is_never_an_address() {
        // Without meta there is no return value to read
        let result = invoke_success_result(&[0xAB; 32]);
        let meta = returning_meta(ScVal::Void);
        assert_eq!(returned_contract_address(&result, &meta).unwrap(), None);
    }

    #[test]
    fn test_returned_contract_address_from_meta() {
        let id = strkey::decode_contract(REGISTERED_CONTRACT).unwrap();
        let result = invoke_success_result(&[0xAB; 32]);
        let found = returned_contract_address(&result, &returned_contract_meta(&id)).unwrap();
        assert_eq!(found.as_deref(), Some(REGISTERED_CONTRACT));

        // A classic result never yields an address, whatever the meta says
        let found =
            returned_contract_address(&payment_result(), &returned_contract_meta(&id)).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_returned_account_is_not_a_contract() {
        let meta = returning_meta(ScVal::Address(sc_address(PROBE_ACCOUNT).unwrap()));
        let result = invoke_success_result(&[1u8; 32]);
        assert_eq!(returned_contract_address(&result, &meta).unwrap(), None);
        assert!(returned_value(&meta).unwrap().is_some());
    }

    #[test]
    fn test_envelope_contract_addresses() {
        let token = strkey::encode_contract(&[2u8; 32]);
        let envelope = invocation_envelope(
            PROBE_ACCOUNT,
            REGISTERED_CONTRACT,
            &[
                ScArg::Address(PROBE_ACCOUNT.to_string()),
                ScArg::Address(token.clone()),
                ScArg::Address(REGISTERED_CONTRACT.to_string()),
            ],
        );

        let found = envelope_contract_addresses(&envelope).unwrap();
        assert_eq!(found, vec![REGISTERED_CONTRACT.to_string(), token]);
    }

    #[test]
    fn test_parameter_contract_addresses() {
        let id = [3u8; 32];
        assert_eq!(
            parameter_contract_addresses(&contract_address_sc_val(&id)),
            vec![strkey::encode_contract(&id)]
        );
        assert!(parameter_contract_addresses("garbage").is_empty());
    }

    #[test]
    fn test_invocation_envelope_layout() {
        let args = [ScArg::Address(PROBE_ACCOUNT.to_string())];
        let envelope = InvocationEnvelope {
            source_account: PROBE_ACCOUNT,
            sequence: 11,
            fee: 100_000,
            contract_id: REGISTERED_CONTRACT,
            function_name: "get_employee_info",
            args: &args,
        };
        let decoded =
            TransactionEnvelope::from_xdr_base64(envelope.to_base64().unwrap(), Limits::none())
                .unwrap();

        let TransactionEnvelope::Tx(v1) = decoded else {
            panic!("expected a v1 envelope");
        };
        assert!(v1.signatures.is_empty());
        assert_eq!(
            v1.tx.source_account,
            MuxedAccount::Ed25519(Uint256(strkey::decode_account(PROBE_ACCOUNT).unwrap()))
        );
        assert_eq!(v1.tx.fee, 100_000);
        assert_eq!(v1.tx.seq_num, SequenceNumber(11));
        assert_eq!(v1.tx.memo, Memo::None);
        assert_eq!(v1.tx.operations.len(), 1);

        let OperationBody::InvokeHostFunction(op) = &v1.tx.operations[0].body else {
            panic!("expected an invocation");
        };
        let HostFunction::InvokeContract(call) = &op.host_function else {
            panic!("expected InvokeContract");
        };
        assert_eq!(address_to_string(&call.contract_address), REGISTERED_CONTRACT);
        assert_eq!(call.function_name.0.as_slice(), b"get_employee_info");
        assert_eq!(
            sc_val_to_json(&call.args[0]),
            Value::String(PROBE_ACCOUNT.to_string())
        );
    }

    #[test]
    fn test_invocation_envelope_rejects_placeholder_contract() {
        let placeholder = format!("C{}", "A".repeat(55));
        let envelope = InvocationEnvelope {
            source_account: PROBE_ACCOUNT,
            sequence: 1,
            fee: 100,
            contract_id: &placeholder,
            function_name: "get_employee_info",
            args: &[],
        };
        assert!(matches!(envelope.to_base64(), Err(XdrError::Address(_))));
    }

    #[test]
    fn test_symbol_argument_length_limit() {
        assert!(ScArg::Symbol("active".to_string()).to_sc_val().is_ok());
        assert!(ScArg::Symbol("x".repeat(33)).to_sc_val().is_err());
    }
}
