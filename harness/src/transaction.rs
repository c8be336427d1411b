use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::identity::{Address, NetworkType, PublicAccount};

fn parse_hash32(query: &'static str, s: &str) -> Result<[u8; 32], HarnessError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|err| HarnessError::Query {
        query,
        reason: err.to_string(),
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| HarnessError::Query {
        query,
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

/// Identifying hash of a signed transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionHash([u8; 32]);

impl TransactionHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionHash({self})")
    }
}

impl FromStr for TransactionHash {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hash32("transaction hash", s).map(Self)
    }
}

impl TryFrom<String> for TransactionHash {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionHash> for String {
    fn from(hash: TransactionHash) -> Self {
        hash.to_string()
    }
}

/// Chain identifier mixed into every signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationHash([u8; 32]);

impl GenerationHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for GenerationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for GenerationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenerationHash({self})")
    }
}

impl FromStr for GenerationHash {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hash32("generation hash", s).map(Self)
    }
}

impl TryFrom<String> for GenerationHash {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GenerationHash> for String {
    fn from(hash: GenerationHash) -> Self {
        hash.to_string()
    }
}

/// Numeric transaction type tag, e.g. `0x4154` for a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionType(pub u16);

impl TransactionType {
    pub const TRANSFER: Self = Self(0x4154);
    pub const AGGREGATE_COMPLETE: Self = Self(0x4141);
    pub const AGGREGATE_BONDED: Self = Self(0x4241);
    pub const MULTISIG_ACCOUNT_MODIFICATION: Self = Self(0x4155);
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// Hex encoded signed payload.
    pub payload: String,
    pub hash: TransactionHash,
    pub signer: PublicAccount,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub network_type: NetworkType,
}

impl SignedTransaction {
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }
}

/// Status notification pushed by the node for a watched address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionEvent {
    Confirmed {
        address: Address,
        hash: TransactionHash,
        height: u64,
    },
    Rejected {
        address: Address,
        hash: TransactionHash,
        reason: String,
    },
}

impl TransactionEvent {
    pub fn address(&self) -> &Address {
        match self {
            Self::Confirmed { address, .. } | Self::Rejected { address, .. } => address,
        }
    }

    pub fn hash(&self) -> &TransactionHash {
        match self {
            Self::Confirmed { hash, .. } | Self::Rejected { hash, .. } => hash,
        }
    }
}

/// Result of a successful announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedTransaction {
    pub hash: TransactionHash,
    pub signer: Address,
    pub transaction_type: TransactionType,
    pub height: u64,
}
