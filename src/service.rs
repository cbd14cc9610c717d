//! Background sealing loop.
//!
//! Wakes every `interval`, and when transactions are pending runs a mining
//! round on the blocking pool. Shutdown cancels any round in flight.

use crate::ledger::{Ledger, MineOutcome};
use crate::miner::CancelToken;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct MinerService {
    cancel: CancelToken,
    shutdown: Arc<Notify>,
    blocks_sealed: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl MinerService {
    /// Must be called from within a tokio runtime.
    pub fn spawn(ledger: Arc<Ledger>, interval: Duration) -> Self {
        let cancel = CancelToken::new();
        let shutdown = Arc::new(Notify::new());
        let blocks_sealed = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(run(
            ledger,
            interval,
            cancel.clone(),
            shutdown.clone(),
            blocks_sealed.clone(),
        ));
        info!("Miner service started (interval {:?})", interval);

        MinerService {
            cancel,
            shutdown,
            blocks_sealed,
            handle,
        }
    }

    pub fn blocks_sealed(&self) -> u64 {
        self.blocks_sealed.load(Ordering::SeqCst)
    }

    /// Stops the loop and waits for it; returns the number of blocks sealed.
    pub async fn shutdown(self) -> u64 {
        self.cancel.cancel();
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            error!("Miner service task failed: {}", e);
        }
        let sealed = self.blocks_sealed.load(Ordering::SeqCst);
        info!("Miner service stopped after sealing {} blocks", sealed);
        sealed
    }
}

async fn run(
    ledger: Arc<Ledger>,
    interval: Duration,
    cancel: CancelToken,
    shutdown: Arc<Notify>,
    blocks_sealed: Arc<AtomicU64>,
) {
    while !cancel.is_cancelled() {
        if ledger.pending_count() > 0 {
            let round_ledger = ledger.clone();
            let round_cancel = cancel.clone();
            match tokio::task::spawn_blocking(move || round_ledger.mine_with(&round_cancel)).await {
                Ok(Ok(MineOutcome::Sealed(receipt))) => {
                    blocks_sealed.fetch_add(1, Ordering::SeqCst);
                    info!(
                        "Sealed block with {} transactions, reward to {}",
                        receipt.applied.len(),
                        receipt.winner
                    );
                }
                Ok(Ok(MineOutcome::NotFound { attempts, reason })) => {
                    debug!("No block this round ({:?} after {} attempts)", reason, attempts);
                }
                Ok(Err(e)) => warn!("Mining round failed: {}", e),
                Err(e) => {
                    error!("Mining round panicked: {}", e);
                    break;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.notified() => break,
        }
    }
}
