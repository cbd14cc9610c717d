//! Admission control: the gate between a signed transfer and the mempool.
//!
//! Every check is made against the registry as it stands at submission time.
//! Balances can still move before the next block, which is why commit
//! re-validates (see [`crate::commit`]).

use crate::error::LedgerError;
use crate::mempool::Mempool;
use crate::registry::Registry;
use crate::transaction::{SignedTransaction, Transaction};
use tracing::{debug, warn};

/// Validates `signed` and appends it to `mempool`.
///
/// On rejection nothing is modified and the reason is returned.
pub fn admit(
    registry: &Registry,
    mempool: &mut Mempool,
    signed: SignedTransaction,
) -> Result<(), LedgerError> {
    match check(registry, &signed).and_then(|()| mempool.push(signed.clone())) {
        Ok(()) => {
            debug!("Admitted {}", signed.transaction);
            Ok(())
        }
        Err(reason) => {
            warn!("Rejected {}: {}", signed.transaction, reason);
            Err(reason)
        }
    }
}

/// Parses a canonical wire string first; a string that does not parse is a
/// rejection like any other.
pub fn admit_raw(
    registry: &Registry,
    mempool: &mut Mempool,
    canonical: &str,
    signature: &[u8],
) -> Result<(), LedgerError> {
    let transaction = Transaction::parse(canonical).map_err(|reason| {
        warn!("Rejected unparseable transaction {:?}: {}", canonical, reason);
        reason
    })?;
    admit(
        registry,
        mempool,
        SignedTransaction {
            transaction,
            signature: signature.to_vec(),
        },
    )
}

fn check(registry: &Registry, signed: &SignedTransaction) -> Result<(), LedgerError> {
    let tx = &signed.transaction;

    let sender = registry
        .lookup(tx.sender())
        .ok_or_else(|| LedgerError::UnknownSender(tx.sender().to_string()))?;
    if !registry.contains(tx.receiver()) {
        return Err(LedgerError::UnknownReceiver(tx.receiver().to_string()));
    }

    signed
        .verify_with(&sender.public_key())
        .map_err(|_| LedgerError::SignatureInvalid)?;

    let available = registry.balance_of(tx.sender());
    if available < tx.amount() {
        return Err(LedgerError::InsufficientFunds {
            sender: tx.sender().to_string(),
            available,
            needed: tx.amount(),
        });
    }
    Ok(())
}
