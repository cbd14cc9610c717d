//! Error types for PowLedger

use crate::transaction::Amount;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Unknown sender: {0}")]
    UnknownSender(String),
    #[error("Unknown receiver: {0}")]
    UnknownReceiver(String),
    #[error("Signature verification failed")]
    SignatureInvalid,
    #[error("Insufficient funds: {sender} holds {available}, needs {needed}")]
    InsufficientFunds {
        sender: String,
        available: Amount,
        needed: Amount,
    },
    #[error("Mempool is full ({0} pending transactions)")]
    MempoolFull(usize),
    #[error("Corrupt mempool entry: {0}")]
    CorruptMempoolEntry(String),
    #[error("Invalid participant id: {0:?}")]
    InvalidIdentifier(String),
    #[error("No free participant id could be derived from {0:?}")]
    IdentifierExhausted(String),
    #[error("Winning participant {0} is not registered")]
    UnregisteredWinner(String),
    #[error("No registered participants to mine with")]
    NoParticipants,
    #[error("Balance overflow for {0}")]
    BalanceOverflow(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl LedgerError {
    /// True for the reasons admission control turns a submission away with.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::MalformedTransaction(_)
                | LedgerError::InvalidAmount(_)
                | LedgerError::UnknownSender(_)
                | LedgerError::UnknownReceiver(_)
                | LedgerError::SignatureInvalid
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::MempoolFull(_)
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
