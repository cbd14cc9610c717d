//! Sealing a block: applying a mempool snapshot to the registry.

use crate::error::LedgerError;
use crate::miner::Winner;
use crate::registry::Registry;
use crate::transaction::{Amount, SignedTransaction, Transaction};
use tracing::{info, warn};

/// A mempool entry that was dropped instead of applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRejection {
    pub transaction: Transaction,
    pub reason: LedgerError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReceipt {
    pub winner: String,
    pub nonce: u64,
    pub hash: String,
    pub reward: Amount,
    pub applied: Vec<Transaction>,
    pub rejected: Vec<CommitRejection>,
}

/// Applies `entries` in order, then pays `reward` to the winner.
///
/// Each entry is re-checked against the running balances: an entry whose
/// sender or receiver is missing is a `CorruptMempoolEntry`, one that would
/// overdraw its sender is dropped with `InsufficientFunds`. A transaction is
/// applied entirely or not at all, so total supply grows by exactly `reward`.
///
/// The block is staged on a copy of the registry. On error `registry` is
/// left exactly as it was.
pub fn commit_block(
    registry: &mut Registry,
    entries: &[SignedTransaction],
    winner: &Winner,
    reward: Amount,
) -> Result<BlockReceipt, LedgerError> {
    if !registry.contains(&winner.participant) {
        return Err(LedgerError::UnregisteredWinner(winner.participant.clone()));
    }

    let mut staged = registry.clone();
    let mut applied = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for entry in entries {
        let tx = &entry.transaction;
        match apply_transfer(&mut staged, tx) {
            Ok(()) => applied.push(tx.clone()),
            Err(reason) => {
                warn!("Dropped {} at commit: {}", tx, reason);
                rejected.push(CommitRejection {
                    transaction: tx.clone(),
                    reason,
                });
            }
        }
    }

    staged.credit(&winner.participant, reward)?;
    *registry = staged;

    info!(
        "Sealed block: {} applied, {} dropped, {} paid {}",
        applied.len(),
        rejected.len(),
        winner.participant,
        reward
    );
    Ok(BlockReceipt {
        winner: winner.participant.clone(),
        nonce: winner.nonce,
        hash: winner.hash.clone(),
        reward,
        applied,
        rejected,
    })
}

fn apply_transfer(registry: &mut Registry, tx: &Transaction) -> Result<(), LedgerError> {
    if !registry.contains(tx.sender()) {
        return Err(LedgerError::CorruptMempoolEntry(format!(
            "sender {} is not registered",
            tx.sender()
        )));
    }
    if !registry.contains(tx.receiver()) {
        return Err(LedgerError::CorruptMempoolEntry(format!(
            "receiver {} is not registered",
            tx.receiver()
        )));
    }
    // Check the credit side before touching anything so a failure leaves both balances as they were
    registry
        .balance_of(tx.receiver())
        .checked_add(tx.amount())
        .ok_or_else(|| LedgerError::BalanceOverflow(tx.receiver().to_string()))?;

    registry.debit(tx.sender(), tx.amount())?;
    registry.credit(tx.receiver(), tx.amount())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winner(participant: &str) -> Winner {
        Winner {
            participant: participant.to_string(),
            nonce: 7,
            hash: "00000abc".to_string(),
            attempts: 1,
        }
    }

    fn signed(registry: &Registry, sender: &str, receiver: &str, amount: f64) -> SignedTransaction {
        let tx = Transaction::from_f64(sender, receiver, amount).unwrap();
        match registry.lookup(sender) {
            Some(identity) => SignedTransaction::sign(tx, &identity),
            None => SignedTransaction {
                transaction: tx,
                signature: Vec::new(),
            },
        }
    }

    fn registry_with(balances: &[(&str, f64)]) -> Registry {
        let mut registry = Registry::default();
        for (id, balance) in balances {
            registry.register(id).unwrap();
            registry.credit(id, Amount::from_num(*balance)).unwrap();
        }
        registry
    }

    #[test]
    fn test_applies_in_order_and_pays_reward() {
        let mut registry = registry_with(&[("alice", 10.0), ("bob", 0.0)]);
        let entries = vec![
            signed(&registry, "alice", "bob", 4.0),
            signed(&registry, "bob", "alice", 1.5),
        ];
        let receipt =
            commit_block(&mut registry, &entries, &winner("bob"), Amount::from_num(6.25)).unwrap();

        assert_eq!(receipt.applied.len(), 2);
        assert!(receipt.rejected.is_empty());
        assert_eq!(registry.balance_of("alice"), Amount::from_num(7.5));
        assert_eq!(registry.balance_of("bob"), Amount::from_num(2.5 + 6.25));
    }

    #[test]
    fn test_overdraft_dropped_at_commit() {
        // Both admitted against a balance of 5, only one can be honoured
        let mut registry = registry_with(&[("alice", 5.0), ("bob", 0.0), ("carol", 0.0)]);
        let entries = vec![
            signed(&registry, "alice", "bob", 4.0),
            signed(&registry, "alice", "carol", 4.0),
        ];
        let before = registry.total_supply();
        let receipt =
            commit_block(&mut registry, &entries, &winner("carol"), Amount::from_num(1)).unwrap();

        assert_eq!(receipt.applied, vec![entries[0].transaction.clone()]);
        assert_eq!(receipt.rejected.len(), 1);
        assert!(matches!(
            receipt.rejected[0].reason,
            LedgerError::InsufficientFunds { .. }
        ));
        assert_eq!(registry.balance_of("alice"), Amount::from_num(1));
        assert_eq!(registry.balance_of("bob"), Amount::from_num(4));
        assert_eq!(registry.balance_of("carol"), Amount::from_num(1));
        assert_eq!(registry.total_supply(), before + Amount::from_num(1));
    }

    #[test]
    fn test_earlier_credit_funds_later_debit() {
        let mut registry = registry_with(&[("alice", 4.0), ("bob", 0.0)]);
        let entries = vec![
            signed(&registry, "alice", "bob", 4.0),
            signed(&registry, "bob", "alice", 3.0),
        ];
        let receipt =
            commit_block(&mut registry, &entries, &winner("alice"), Amount::ZERO).unwrap();
        assert_eq!(receipt.applied.len(), 2);
        assert_eq!(registry.balance_of("alice"), Amount::from_num(3));
        assert_eq!(registry.balance_of("bob"), Amount::from_num(1));
    }

    #[test]
    fn test_corrupt_entry_skipped() {
        let mut registry = registry_with(&[("alice", 5.0), ("bob", 0.0)]);
        let entries = vec![
            signed(&registry, "ghost", "bob", 1.0),
            signed(&registry, "alice", "ghost", 1.0),
            signed(&registry, "alice", "bob", 2.0),
        ];
        let receipt =
            commit_block(&mut registry, &entries, &winner("alice"), Amount::ZERO).unwrap();
        assert_eq!(receipt.applied.len(), 1);
        assert_eq!(receipt.rejected.len(), 2);
        for rejection in &receipt.rejected {
            assert!(matches!(rejection.reason, LedgerError::CorruptMempoolEntry(_)));
        }
        assert_eq!(registry.balance_of("alice"), Amount::from_num(3));
        assert_eq!(registry.balance_of("bob"), Amount::from_num(2));
    }

    #[test]
    fn test_conservation_with_fractional_amounts() {
        let mut registry = registry_with(&[("alice", 1.0), ("bob", 0.7), ("carol", 0.0)]);
        let entries = vec![
            signed(&registry, "alice", "bob", 0.1),
            signed(&registry, "bob", "carol", 0.2),
            signed(&registry, "carol", "alice", 0.3),
            signed(&registry, "alice", "carol", 0.9),
        ];
        let before = registry.total_supply();
        let reward = Amount::from_num(6.25);
        commit_block(&mut registry, &entries, &winner("bob"), reward).unwrap();
        assert_eq!(registry.total_supply(), before + reward);
    }

    #[test]
    fn test_unregistered_winner() {
        let mut registry = registry_with(&[("alice", 1.0), ("bob", 0.0)]);
        let entries = vec![signed(&registry, "alice", "bob", 1.0)];
        let result = commit_block(&mut registry, &entries, &winner("nobody"), Amount::from_num(1));
        assert_eq!(result, Err(LedgerError::UnregisteredWinner("nobody".to_string())));
        // Nothing was applied
        assert_eq!(registry.balance_of("alice"), Amount::from_num(1));
    }

    #[test]
    fn test_reward_overflow_rolls_back_transfers() {
        let mut registry = registry_with(&[("alice", 10.0), ("bob", 0.0), ("walt", 0.0)]);
        registry.credit("walt", Amount::MAX - Amount::from_num(1)).unwrap();
        let entries = vec![signed(&registry, "alice", "bob", 4.0)];
        let before = registry.list_balances();

        let result = commit_block(&mut registry, &entries, &winner("walt"), Amount::from_num(6.25));
        assert_eq!(result, Err(LedgerError::BalanceOverflow("walt".to_string())));
        assert_eq!(registry.list_balances(), before);
        assert_eq!(registry.balance_of("alice"), Amount::from_num(10));
        assert_eq!(registry.balance_of("bob"), Amount::ZERO);
    }
}
