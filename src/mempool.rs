//! Admitted transactions waiting to be sealed, in admission order.

use crate::error::LedgerError;
use crate::transaction::SignedTransaction;

#[derive(Debug, Clone)]
pub struct Mempool {
    entries: Vec<SignedTransaction>,
    max_pending: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Mempool {
    pub fn new(max_pending: usize) -> Self {
        Mempool {
            entries: Vec::new(),
            max_pending,
        }
    }

    pub fn push(&mut self, entry: SignedTransaction) -> Result<(), LedgerError> {
        if self.entries.len() >= self.max_pending {
            return Err(LedgerError::MempoolFull(self.entries.len()));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignedTransaction> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<SignedTransaction> {
        self.entries.clone()
    }

    /// Concatenated canonical forms of every pending transaction.
    pub fn digest(&self) -> String {
        digest_of(&self.entries)
    }

    /// Removes the first `count` entries, leaving anything admitted after them.
    pub fn drain_prefix(&mut self, count: usize) -> Vec<SignedTransaction> {
        let count = count.min(self.entries.len());
        self.entries.drain(..count).collect()
    }
}

/// The string a proof-of-work search hashes its nonces against.
pub fn digest_of(entries: &[SignedTransaction]) -> String {
    entries
        .iter()
        .map(|entry| entry.transaction.canonical_form())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::transaction::Transaction;

    fn signed(sender: &Identity, receiver: &str, amount: f64) -> SignedTransaction {
        let tx = Transaction::from_f64(sender.id(), receiver, amount).unwrap();
        SignedTransaction::sign(tx, sender)
    }

    #[test]
    fn test_push_preserves_order_and_digest() {
        let alice = Identity::create("alice");
        let mut mempool = Mempool::default();
        let first = signed(&alice, "bob", 1.0);
        let second = signed(&alice, "carol", 2.0);
        mempool.push(first.clone()).unwrap();
        mempool.push(second.clone()).unwrap();

        assert_eq!(mempool.len(), 2);
        let expected = format!(
            "{}{}",
            first.transaction.canonical_form(),
            second.transaction.canonical_form()
        );
        assert_eq!(mempool.digest(), expected);
        assert_eq!(mempool.snapshot(), vec![first, second]);
    }

    #[test]
    fn test_empty_digest() {
        assert_eq!(Mempool::default().digest(), "");
    }

    #[test]
    fn test_capacity_limit() {
        let alice = Identity::create("alice");
        let mut mempool = Mempool::new(1);
        mempool.push(signed(&alice, "bob", 1.0)).unwrap();
        assert_eq!(
            mempool.push(signed(&alice, "bob", 1.0)),
            Err(LedgerError::MempoolFull(1))
        );
    }

    #[test]
    fn test_drain_prefix_keeps_later_entries() {
        let alice = Identity::create("alice");
        let mut mempool = Mempool::default();
        for amount in [1.0, 2.0, 3.0] {
            mempool.push(signed(&alice, "bob", amount)).unwrap();
        }
        let drained = mempool.drain_prefix(2);
        assert_eq!(drained.len(), 2);
        assert_eq!(mempool.len(), 1);
        let remaining = mempool.iter().next().unwrap();
        assert_eq!(remaining.transaction.amount(), crate::transaction::Amount::from_num(3));

        assert_eq!(mempool.drain_prefix(10).len(), 1);
        assert!(mempool.is_empty());
    }
}
