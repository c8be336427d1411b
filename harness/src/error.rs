use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::identity::Address;
use crate::transaction::TransactionHash;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no identities available in address book {path}: {reason}")]
    NoIdentities { path: PathBuf, reason: String },

    #[error("roster needs {required} identities, address book provides {available}")]
    InsufficientIdentities { required: usize, available: usize },

    #[error("invalid private key at roster index {index}: {source}")]
    InvalidPrivateKey {
        index: usize,
        #[source]
        source: KeyError,
    },

    #[error("bootstrap service error: {0}")]
    Service(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("malformed {query} response: {reason}")]
    Query { query: &'static str, reason: String },

    #[error("notification channel is already open")]
    ChannelAlreadyOpen,

    #[error("notification channel is not open")]
    ChannelNotOpen,

    #[error("notification channel closed before {hash} from {address} resolved")]
    ChannelClosed {
        address: Address,
        hash: TransactionHash,
    },

    #[error("transaction {hash} rejected: {reason}")]
    TransactionRejected {
        hash: TransactionHash,
        reason: String,
    },

    #[error("transaction {hash} not confirmed within {timeout:?}")]
    ConfirmationTimeout {
        hash: TransactionHash,
        timeout: Duration,
    },

    #[error("amount {amount} overflows at divisibility {divisibility}")]
    AmountOverflow { amount: u64, divisibility: u8 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a private key could not be turned into an identity.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("private key is not hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 key bytes, got {0}")]
    Length(usize),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
