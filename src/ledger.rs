//! The ledger surface: registration, transfers, mining and balance queries.
//!
//! Registry and mempool live behind a single `RwLock`. Admission and commit
//! take it for writing. A mining round snapshots the mempool, searches with
//! no lock held, then commits exactly the snapshotted entries and drains
//! exactly that prefix. Anything admitted during the search stays pending.
//! Rounds are serialized by their own mutex, so the prefix cannot move
//! underneath a search.

use crate::admission::{admit, admit_raw};
use crate::commit::{commit_block, BlockReceipt};
use crate::config::Config;
use crate::error::LedgerError;
use crate::identity::Identity;
use crate::mempool::{digest_of, Mempool};
use crate::miner::{CancelToken, Miner, SearchOutcome, StopReason};
use crate::registry::Registry;
use crate::transaction::{Amount, SignedTransaction, Transaction};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct LedgerState {
    pub registry: Registry,
    pub mempool: Mempool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    Sealed(BlockReceipt),
    /// No winner before the search was stopped; retry later.
    NotFound { attempts: u64, reason: StopReason },
}

impl MineOutcome {
    pub fn receipt(&self) -> Option<&BlockReceipt> {
        match self {
            MineOutcome::Sealed(receipt) => Some(receipt),
            MineOutcome::NotFound { .. } => None,
        }
    }

    pub fn nonce(&self) -> Option<u64> {
        self.receipt().map(|receipt| receipt.nonce)
    }
}

#[derive(Debug)]
pub struct Ledger {
    state: RwLock<LedgerState>,
    miner: Miner,
    mining: Mutex<()>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::from_parts(Registry::default(), Mempool::default(), Miner::default())
    }
}

impl Ledger {
    pub fn new(config: &Config) -> Result<Self, LedgerError> {
        config.validate()?;
        let registry = Registry::new(
            config.ledger.starting_balance()?,
            config.ledger.id_suffix_digits,
        );
        let mempool = Mempool::new(config.ledger.max_pending);
        Ok(Self::from_parts(registry, mempool, Miner::from_config(&config.miner)?))
    }

    pub fn from_parts(registry: Registry, mempool: Mempool, miner: Miner) -> Self {
        Ledger {
            state: RwLock::new(LedgerState { registry, mempool }),
            miner,
            mining: Mutex::new(()),
        }
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn register(&self, requested_id: &str) -> Result<Arc<Identity>, LedgerError> {
        self.state.write().registry.register(requested_id)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Identity>> {
        self.state.read().registry.lookup(id)
    }

    pub fn balance_of(&self, id: &str) -> Amount {
        self.state.read().registry.balance_of(id)
    }

    /// Mints `amount` into `id`'s balance outside of any block.
    pub fn credit(&self, id: &str, amount: Amount) -> Result<Amount, LedgerError> {
        self.state.write().registry.credit(id, amount)
    }

    pub fn list_balances(&self) -> Vec<(String, Amount)> {
        self.state.read().registry.list_balances()
    }

    pub fn total_supply(&self) -> Amount {
        self.state.read().registry.total_supply()
    }

    pub fn pending_count(&self) -> usize {
        self.state.read().mempool.len()
    }

    pub fn pending(&self) -> Vec<SignedTransaction> {
        self.state.read().mempool.snapshot()
    }

    pub fn submit(&self, signed: SignedTransaction) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let LedgerState { registry, mempool } = &mut *state;
        admit(registry, mempool, signed)
    }

    pub fn submit_raw(&self, canonical: &str, signature: &[u8]) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let LedgerState { registry, mempool } = &mut *state;
        admit_raw(registry, mempool, canonical, signature)
    }

    /// Builds, signs with the sender's registered identity, and submits a transfer.
    pub fn submit_transfer(
        &self,
        sender: &str,
        receiver: &str,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let identity = self
            .lookup(sender)
            .ok_or_else(|| LedgerError::UnknownSender(sender.to_string()))?;
        let transaction = Transaction::new(sender, receiver, amount)?;
        self.submit(SignedTransaction::sign(transaction, &identity))
    }

    pub fn mine(&self) -> Result<MineOutcome, LedgerError> {
        self.mine_with(&CancelToken::new())
    }

    /// Runs one search-and-commit round, stoppable through `cancel`.
    pub fn mine_with(&self, cancel: &CancelToken) -> Result<MineOutcome, LedgerError> {
        let _round = self.mining.lock();

        let (entries, participants) = {
            let state = self.state.read();
            (state.mempool.snapshot(), state.registry.participant_ids())
        };
        let digest = digest_of(&entries);
        debug!(
            "Mining round over {} pending transactions and {} participants",
            entries.len(),
            participants.len()
        );

        let winner = match self.miner.search(&digest, &participants, cancel)? {
            SearchOutcome::Found(winner) => winner,
            SearchOutcome::Exhausted { attempts, reason } => {
                return Ok(MineOutcome::NotFound { attempts, reason })
            }
        };

        let mut state = self.state.write();
        let LedgerState { registry, mempool } = &mut *state;
        let receipt = commit_block(registry, &entries, &winner, self.miner.reward)?;
        let drained = mempool.drain_prefix(entries.len());
        debug_assert_eq!(drained, entries);
        info!(
            "Block sealed by {} (nonce {}), {} transactions still pending",
            receipt.winner,
            receipt.nonce,
            mempool.len()
        );
        Ok(MineOutcome::Sealed(receipt))
    }
}
