//! Unsigned multi-clause transaction descriptors handed to an external signer.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use vechain_core::{CapabilityError, Network};

use crate::units::to_hex_quantity;

/// One `{to, value, data}` unit of a VeChain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Clause {
    /// Lowercase 0x-prefixed recipient or contract address
    pub to: String,
    /// Hex quantity in base units, `"0x0"` when no VET moves
    pub value: String,
    /// 0x-prefixed call data, `"0x"` for a plain transfer
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Clause {
    pub fn new(to: Address, value: U256, data: &[u8], comment: Option<String>) -> Self {
        Self {
            to: format_address(&to),
            value: to_hex_quantity(value),
            data: format!("0x{}", hex::encode(data)),
            comment,
        }
    }
}

/// A fully specified transaction that has not been signed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDescriptor {
    pub sender: String,
    /// Executed in order; an approval always precedes the clause spending it
    pub clauses: Vec<Clause>,
    pub network: Network,
    pub human_summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TransactionDescriptor {
    pub fn new(
        sender: Address,
        clauses: Vec<Clause>,
        network: Network,
        human_summary: String,
    ) -> Result<Self, CapabilityError> {
        if clauses.is_empty() {
            return Err(CapabilityError::Execution(
                "transaction has no clauses".to_string(),
            ));
        }
        Ok(Self {
            sender: format_address(&sender),
            clauses,
            network,
            human_summary,
            warnings: Vec::new(),
        })
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_slice()))
}

/// Parses a 0x-prefixed 20-byte address. Checksum casing is not enforced.
pub fn parse_address(field: &str, value: &str) -> Result<Address, CapabilityError> {
    let value = value.trim();
    let hex_part = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| CapabilityError::field(field, "address must start with 0x"))?;
    if hex_part.len() != 40 {
        return Err(CapabilityError::field(
            field,
            format!("address must have 40 hex digits, found {}", hex_part.len()),
        ));
    }
    let bytes = hex::decode(hex_part)
        .map_err(|err| CapabilityError::field(field, format!("invalid address: {err}")))?;
    Ok(Address::from_slice(&bytes))
}

/// Parses every `(field, value)` address, collecting all failures into one validation error.
pub fn parse_addresses<const N: usize>(
    fields: [(&str, &str); N],
) -> Result<[Address; N], CapabilityError> {
    let mut errors = Vec::new();
    let mut addrs = [Address::ZERO; N];
    for (i, (field, value)) in fields.into_iter().enumerate() {
        match parse_address(field, value) {
            Ok(addr) => addrs[i] = addr,
            Err(err) => errors.extend(err.fields().iter().cloned()),
        }
    }
    if errors.is_empty() {
        Ok(addrs)
    } else {
        Err(CapabilityError::Validation(errors))
    }
}
