//! Transaction types for PowLedger
use crate::error::LedgerError;
use crate::identity::Identity;
use fixed::types::I64F64;
use serde::{Deserialize, Serialize};

use super::codec::{check_participant_id, SEPARATOR};

/// Balance and transfer amounts.
///
/// Fixed-point keeps addition exact, so a commit conserves value to the last bit.
pub type Amount = I64F64;

/// "sender transfers amount to receiver"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    receiver: String,
    amount: Amount,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: Amount,
    ) -> Result<Self, LedgerError> {
        let sender = sender.into();
        let receiver = receiver.into();
        check_participant_id(&sender)?;
        check_participant_id(&receiver)?;
        if amount < Amount::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "Transfer amount cannot be negative: {}",
                amount
            )));
        }
        Ok(Transaction {
            sender,
            receiver,
            amount,
        })
    }

    /// Builds a transaction from a floating point amount.
    pub fn from_f64(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
    ) -> Result<Self, LedgerError> {
        Self::new(sender, receiver, amount_from_f64(amount)?)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// `sender-receiver-amount`: the bytes that get signed and hashed.
    pub fn canonical_form(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.sender,
            self.receiver,
            self.amount,
            sep = SEPARATOR
        )
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_form())
    }
}

/// Converts a float into an [`Amount`], refusing negative and non-finite values.
pub fn amount_from_f64(value: f64) -> Result<Amount, LedgerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::InvalidAmount(format!(
            "Amount must be a non-negative finite number, got {}",
            value
        )));
    }
    Amount::checked_from_num(value).ok_or_else(|| {
        LedgerError::InvalidAmount(format!("Amount {} is out of range", value))
    })
}

/// A transaction together with the sender's signature over its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn sign(transaction: Transaction, signer: &Identity) -> Self {
        let signature = signer.sign(transaction.canonical_form().as_bytes());
        SignedTransaction {
            transaction,
            signature,
        }
    }

    /// Verifies the signature over the canonical form re-derived from the fields.
    pub fn verify_with(&self, public_key: &[u8]) -> Result<(), LedgerError> {
        let message = self.transaction.canonical_form();
        crate::crypto::verify_signature(public_key, message.as_bytes(), &self.signature)
    }
}
