//! Participant registry: the authoritative id -> (identity, balance) table.

use crate::error::LedgerError;
use crate::identity::Identity;
use crate::transaction::{is_valid_participant_id, Amount};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// How many suffixed candidates `register` draws before giving up on an id.
pub const MAX_SUFFIX_ATTEMPTS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct Account {
    pub identity: Arc<Identity>,
    pub balance: Amount,
}

/// Accounts keyed by id. Iteration is in ascending id order, which is also
/// the order mining lanes and balance listings use.
#[derive(Debug, Clone)]
pub struct Registry {
    accounts: BTreeMap<String, Account>,
    starting_balance: Amount,
    suffix_digits: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Amount::ZERO, 4)
    }
}

impl Registry {
    pub fn new(starting_balance: Amount, suffix_digits: u32) -> Self {
        Registry {
            accounts: BTreeMap::new(),
            starting_balance,
            suffix_digits,
        }
    }

    /// Registers `requested_id`, or a suffixed variant of it when taken.
    ///
    /// The returned identity carries the id actually stored.
    pub fn register(&mut self, requested_id: &str) -> Result<Arc<Identity>, LedgerError> {
        if !is_valid_participant_id(requested_id) {
            return Err(LedgerError::InvalidIdentifier(requested_id.to_string()));
        }

        let id = if self.accounts.contains_key(requested_id) {
            let derived = self.derive_free_id(requested_id, &mut rand::thread_rng())?;
            debug!("Participant id {} taken, registered as {}", requested_id, derived);
            derived
        } else {
            requested_id.to_string()
        };

        let identity = Arc::new(Identity::create(id.clone()));
        self.accounts.insert(
            id.clone(),
            Account {
                identity: identity.clone(),
                balance: self.starting_balance,
            },
        );
        info!("Registered participant {} (balance {})", id, self.starting_balance);
        Ok(identity)
    }

    fn derive_free_id<R: Rng>(&self, base: &str, rng: &mut R) -> Result<String, LedgerError> {
        let upper = 10u64.pow(self.suffix_digits);
        for _ in 0..MAX_SUFFIX_ATTEMPTS {
            let suffix = rng.gen_range(0..upper);
            let candidate = format!(
                "{}{:0width$}",
                base,
                suffix,
                width = self.suffix_digits as usize
            );
            if !self.accounts.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(LedgerError::IdentifierExhausted(base.to_string()))
    }

    /// Unknown participants hold nothing.
    pub fn balance_of(&self, id: &str) -> Amount {
        self.accounts
            .get(id)
            .map(|account| account.balance)
            .unwrap_or(Amount::ZERO)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Identity>> {
        self.accounts.get(id).map(|account| account.identity.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn credit(&mut self, id: &str, amount: Amount) -> Result<Amount, LedgerError> {
        let account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownReceiver(id.to_string()))?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(id.to_string()))?;
        Ok(account.balance)
    }

    /// Never takes a balance below zero.
    pub fn debit(&mut self, id: &str, amount: Amount) -> Result<Amount, LedgerError> {
        let account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownSender(id.to_string()))?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                sender: id.to_string(),
                available: account.balance,
                needed: amount,
            });
        }
        account.balance -= amount;
        Ok(account.balance)
    }

    pub fn list_balances(&self) -> Vec<(String, Amount)> {
        self.accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.balance))
            .collect()
    }

    pub fn participant_ids(&self) -> Vec<String> {
        self.accounts.keys().cloned().collect()
    }

    pub fn total_supply(&self) -> Amount {
        self.accounts.values().map(|account| account.balance).sum()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
