//! Canonical text form of a transaction: `sender-receiver-amount`
use crate::error::LedgerError;
use crate::transaction::types::{Amount, Transaction};
use std::str::FromStr;

pub(crate) const SEPARATOR: char = '-';

/// Participant ids are `[A-Za-z0-9_]+`, so the separator can never occur inside one.
pub fn is_valid_participant_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn check_participant_id(id: &str) -> Result<(), LedgerError> {
    if is_valid_participant_id(id) {
        Ok(())
    } else {
        Err(LedgerError::MalformedTransaction(format!(
            "Participant id {:?} must be non-empty and contain only [A-Za-z0-9_]",
            id
        )))
    }
}

/// `\d+(\.\d+)?`
fn is_decimal_literal(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    match parts.next() {
        Some(fraction) => digits(whole) && digits(fraction),
        None => digits(whole),
    }
}

fn parse_amount(s: &str) -> Result<Amount, LedgerError> {
    if !is_decimal_literal(s) {
        return Err(LedgerError::InvalidAmount(format!(
            "{:?} is not a non-negative decimal",
            s
        )));
    }
    Amount::from_str(s)
        .map_err(|e| LedgerError::InvalidAmount(format!("{:?} cannot be represented: {}", s, e)))
}

impl Transaction {
    /// Parses the canonical form back into its three fields.
    pub fn parse(canonical: &str) -> Result<Self, LedgerError> {
        let mut fields = canonical.splitn(3, SEPARATOR);
        let (sender, receiver, amount) = match (fields.next(), fields.next(), fields.next()) {
            (Some(s), Some(r), Some(a)) => (s, r, a),
            _ => {
                return Err(LedgerError::MalformedTransaction(format!(
                    "Expected sender{sep}receiver{sep}amount, got {:?}",
                    canonical,
                    sep = SEPARATOR
                )))
            }
        };
        check_participant_id(sender)?;
        check_participant_id(receiver)?;
        let amount = parse_amount(amount)?;
        Transaction::new(sender, receiver, amount)
    }
}

impl FromStr for Transaction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transaction::parse(s)
    }
}
