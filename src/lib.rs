//! PowLedger - a single-node ledger sealed by proof-of-work
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`ledger`] - The exposed surface: register, transfer, mine, list balances
//! - [`registry`] - Participant ids, identities and balances
//! - [`transaction`] - Transfer values and their canonical text form
//! - [`mempool`] - Admitted transactions awaiting the next block
//! - [`admission`] - Validation gate in front of the mempool
//!
//! ## Mining
//! - [`miner`] - Parallel, cancellable proof-of-work search
//! - [`commit`] - Re-validating and applying a block
//! - [`service`] - Periodic background sealing
//!
//! ## Cryptography
//! - [`crypto`] - Signatures and hashing (secp256k1, SHA-256)
//! - [`identity`] - Participant key material
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod admission;
pub mod ledger;
pub mod mempool;
pub mod registry;
pub mod transaction;

// ============================================================================
// Mining
// ============================================================================
pub mod commit;
pub mod miner;
pub mod service;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;
pub mod identity;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{LedgerError, Result};
pub use ledger::{Ledger, MineOutcome};
pub use transaction::{Amount, SignedTransaction, Transaction};
