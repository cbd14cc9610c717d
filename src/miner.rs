//! Proof-of-work search.
//!
//! Every registered participant contributes a stream of random nonces. A
//! nonce wins when `sha256_hex(digest + nonce)` satisfies the [`Difficulty`]
//! predicate. Lanes on a rayon pool draw attempts from a shared counter, and
//! attempt `k` belongs to participant `(start + k) % n` for a random `start`,
//! so every participant gets the same share of hashes however the lanes are
//! scheduled. The search stops as soon as any lane wins, the caller cancels,
//! the deadline passes or the attempt ceiling is reached.

use crate::config::MinerConfig;
use crate::crypto::sha256_hex;
use crate::error::LedgerError;
use crate::transaction::Amount;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Hex characters in a SHA-256 digest.
const HASH_HEX_LEN: usize = 64;

/// The hash's first `window` hex characters must contain `pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difficulty {
    pattern: String,
    window: usize,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty {
            pattern: "0000".to_string(),
            window: 10,
        }
    }
}

impl Difficulty {
    pub fn new(pattern: &str, window: usize) -> Result<Self, LedgerError> {
        if pattern.is_empty() || !pattern.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(LedgerError::ConfigError(format!(
                "Difficulty pattern {:?} must be non-empty lowercase hex",
                pattern
            )));
        }
        if window < pattern.len() || window > HASH_HEX_LEN {
            return Err(LedgerError::ConfigError(format!(
                "Prefix window {} must be between {} and {}",
                window,
                pattern.len(),
                HASH_HEX_LEN
            )));
        }
        Ok(Difficulty {
            pattern: pattern.to_string(),
            window,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_satisfied_by(&self, hash_hex: &str) -> bool {
        hash_hex
            .get(..self.window)
            .map_or(false, |prefix| prefix.contains(self.pattern.as_str()))
    }
}

/// Shared stop signal for a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_attempts: Option<u64>,
    pub timeout: Option<Duration>,
}

impl SearchLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn attempts(max_attempts: u64) -> Self {
        SearchLimits {
            max_attempts: Some(max_attempts),
            timeout: None,
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        SearchLimits {
            max_attempts: None,
            timeout: Some(timeout),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub participant: String,
    pub nonce: u64,
    pub hash: String,
    /// Attempts made across all lanes when the search stopped
    pub attempts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TimedOut,
    AttemptLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Winner),
    Exhausted { attempts: u64, reason: StopReason },
}

/// Search parameters plus the block reward the winner is paid.
#[derive(Debug, Clone)]
pub struct Miner {
    pub difficulty: Difficulty,
    pub limits: SearchLimits,
    pub reward: Amount,
    /// 0 sizes the pool to the machine
    pub threads: usize,
}

impl Default for Miner {
    fn default() -> Self {
        Miner {
            difficulty: Difficulty::default(),
            limits: SearchLimits::unbounded(),
            reward: Amount::from_num(6.25),
            threads: 0,
        }
    }
}

struct LaneState<'a> {
    digest: &'a str,
    difficulty: &'a Difficulty,
    max_attempts: Option<u64>,
    deadline: Option<Instant>,
    cancel: &'a CancelToken,
    stop: AtomicBool,
    attempts: AtomicU64,
}

impl LaneState<'_> {
    fn should_stop(&self, attempt: u64) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        let over_budget = self.max_attempts.map_or(false, |max| attempt > max);
        let past_deadline = self.deadline.map_or(false, |d| Instant::now() >= d);
        if over_budget || past_deadline || self.cancel.is_cancelled() {
            self.stop.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    fn run(&self, participants: &[String], start: usize) -> Option<Winner> {
        let mut rng = StdRng::from_entropy();
        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            if self.should_stop(attempt) {
                return None;
            }
            let participant = &participants[attempt_owner(attempt, start, participants.len())];
            let nonce: u64 = rng.gen();
            let hash = sha256_hex(format!("{}{}", self.digest, nonce).as_bytes());
            if self.difficulty.is_satisfied_by(&hash) {
                // Only the first lane to flip the flag wins
                if self.stop.swap(true, Ordering::SeqCst) {
                    return None;
                }
                return Some(Winner {
                    participant: participant.clone(),
                    nonce,
                    hash,
                    attempts: attempt,
                });
            }
        }
    }
}

/// Index of the participant that owns the 1-based `attempt`.
fn attempt_owner(attempt: u64, start: usize, participants: usize) -> usize {
    let n = participants as u64;
    ((start as u64 + (attempt - 1) % n) % n) as usize
}

impl Miner {
    pub fn from_config(config: &MinerConfig) -> Result<Self, LedgerError> {
        Ok(Miner {
            difficulty: config.difficulty()?,
            limits: config.limits(),
            reward: config.reward()?,
            threads: config.threads,
        })
    }

    /// Worker threads for a search over `participants` participants: the
    /// configured count, or the machine's parallelism, never more than one
    /// per participant.
    pub fn lane_count(&self, participants: usize) -> usize {
        let workers = match self.threads {
            0 => thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        workers.min(participants).max(1)
    }

    /// Searches for a winning `(participant, nonce)` pair against `digest`.
    ///
    /// Cancellation, timeout and the attempt ceiling end the search with
    /// [`SearchOutcome::Exhausted`]; only an empty participant list or a
    /// worker pool that cannot start is an error.
    pub fn search(
        &self,
        digest: &str,
        participants: &[String],
        cancel: &CancelToken,
    ) -> Result<SearchOutcome, LedgerError> {
        if participants.is_empty() {
            return Err(LedgerError::NoParticipants);
        }
        let lanes = self.lane_count(participants.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(lanes)
            .thread_name(|i| format!("pow-lane-{}", i))
            .build()
            .map_err(|e| LedgerError::ConfigError(format!("Failed to start mining workers: {}", e)))?;

        let state = LaneState {
            digest,
            difficulty: &self.difficulty,
            max_attempts: self.limits.max_attempts,
            deadline: self.limits.timeout.map(|t| Instant::now() + t),
            cancel,
            stop: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
        };

        debug!(
            "Searching with {} lanes over {} participants (pattern {:?} in first {})",
            lanes,
            participants.len(),
            self.difficulty.pattern(),
            self.difficulty.window()
        );
        let start = rand::thread_rng().gen_range(0..participants.len());
        let started = Instant::now();
        let found = pool.install(|| {
            (0..lanes)
                .into_par_iter()
                .find_map_any(|_| state.run(participants, start))
        });

        let total = state.attempts.load(Ordering::SeqCst);
        let attempts = self.limits.max_attempts.map_or(total, |max| total.min(max));
        let outcome = match found {
            Some(winner) => {
                info!(
                    "Participant {} found nonce {} after {} attempts in {:?}",
                    winner.participant,
                    winner.nonce,
                    attempts,
                    started.elapsed()
                );
                SearchOutcome::Found(Winner { attempts, ..winner })
            }
            None => {
                let reason = if cancel.is_cancelled() {
                    StopReason::Cancelled
                } else if self.limits.max_attempts.map_or(false, |max| total >= max) {
                    StopReason::AttemptLimit
                } else {
                    StopReason::TimedOut
                };
                info!("Search stopped without a winner ({:?}, {} attempts)", reason, attempts);
                SearchOutcome::Exhausted { attempts, reason }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participants(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// Roughly one in 16^10 hashes would pass.
    fn unreachable_difficulty() -> Difficulty {
        Difficulty::new("ffffffffff", 10).unwrap()
    }

    #[test]
    fn test_difficulty_predicate() {
        let difficulty = Difficulty::default();
        assert!(difficulty.is_satisfied_by("ab0000cdef0123"));
        assert!(difficulty.is_satisfied_by("000012345678"));
        // Zeros past the tenth character do not count
        assert!(!difficulty.is_satisfied_by("abcdefab00000000"));
        assert!(!difficulty.is_satisfied_by("a000b000c000"));
        assert!(!difficulty.is_satisfied_by("0000"));
    }

    #[test]
    fn test_difficulty_validation() {
        assert!(Difficulty::new("", 10).is_err());
        assert!(Difficulty::new("00G0", 10).is_err());
        assert!(Difficulty::new("00AA", 10).is_err());
        assert!(Difficulty::new("0000", 3).is_err());
        assert!(Difficulty::new("0", 65).is_err());
        assert!(Difficulty::new("0", 64).is_ok());
    }

    #[test]
    fn test_search_finds_verifiable_winner() {
        let miner = Miner {
            difficulty: Difficulty::new("0", 10).unwrap(),
            ..Miner::default()
        };
        let ids = participants(&["alice", "bob", "carol"]);
        let digest = "alice-bob-4";
        let outcome = miner.search(digest, &ids, &CancelToken::new()).unwrap();

        let winner = match outcome {
            SearchOutcome::Found(winner) => winner,
            other => panic!("expected a winner, got {:?}", other),
        };
        assert!(ids.contains(&winner.participant));
        let recomputed = sha256_hex(format!("{}{}", digest, winner.nonce).as_bytes());
        assert_eq!(recomputed, winner.hash);
        assert!(miner.difficulty.is_satisfied_by(&winner.hash));
        assert!(winner.attempts >= 1);
    }

    #[test]
    fn test_search_with_default_difficulty() {
        let miner = Miner {
            threads: 2,
            ..Miner::default()
        };
        let ids = participants(&["alice", "bob"]);
        let outcome = miner.search("", &ids, &CancelToken::new()).unwrap();
        assert!(matches!(outcome, SearchOutcome::Found(_)));
    }

    #[test]
    fn test_no_participants_is_an_error() {
        let miner = Miner::default();
        assert_eq!(
            miner.search("digest", &[], &CancelToken::new()),
            Err(LedgerError::NoParticipants)
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let miner = Miner {
            difficulty: unreachable_difficulty(),
            ..Miner::default()
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = miner.search("d", &participants(&["alice"]), &cancel).unwrap();
        assert!(matches!(
            outcome,
            SearchOutcome::Exhausted {
                reason: StopReason::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let miner = Miner {
            difficulty: unreachable_difficulty(),
            ..Miner::default()
        };
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let outcome = miner
            .search("d", &participants(&["alice", "bob"]), &cancel)
            .unwrap();
        handle.join().unwrap();
        assert!(matches!(
            outcome,
            SearchOutcome::Exhausted {
                reason: StopReason::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_attempt_ceiling() {
        let miner = Miner {
            difficulty: unreachable_difficulty(),
            limits: SearchLimits::attempts(500),
            threads: 3,
            ..Miner::default()
        };
        let outcome = miner
            .search("d", &participants(&["a", "b", "c", "d", "e"]), &CancelToken::new())
            .unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::Exhausted {
                attempts: 500,
                reason: StopReason::AttemptLimit
            }
        );
    }

    #[test]
    fn test_timeout() {
        let miner = Miner {
            difficulty: unreachable_difficulty(),
            limits: SearchLimits::timeout(Duration::from_millis(30)),
            ..Miner::default()
        };
        let started = Instant::now();
        let outcome = miner
            .search("d", &participants(&["alice"]), &CancelToken::new())
            .unwrap();
        assert!(matches!(
            outcome,
            SearchOutcome::Exhausted {
                reason: StopReason::TimedOut,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_lane_count_is_capped() {
        let auto = Miner::default();
        let cores = thread::available_parallelism().map_or(1, |n| n.get());
        assert_eq!(auto.lane_count(10_000), cores);
        assert_eq!(auto.lane_count(1), 1);

        let fixed = Miner {
            threads: 3,
            ..Miner::default()
        };
        assert_eq!(fixed.lane_count(10_000), 3);
        assert_eq!(fixed.lane_count(2), 2);
    }

    #[test]
    fn test_attempts_rotate_through_participants() {
        let owners: Vec<usize> = (1..=7).map(|attempt| attempt_owner(attempt, 2, 3)).collect();
        assert_eq!(owners, vec![2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_wins_spread_across_participants() {
        let miner = Miner {
            difficulty: Difficulty::new("0", 4).unwrap(),
            ..Miner::default()
        };
        let ids = participants(&["alice", "bob", "carol"]);
        let mut wins = std::collections::HashMap::new();
        for round in 0..600 {
            let digest = format!("round-{}", round);
            match miner.search(&digest, &ids, &CancelToken::new()).unwrap() {
                SearchOutcome::Found(winner) => *wins.entry(winner.participant).or_insert(0) += 1,
                other => panic!("expected a winner, got {:?}", other),
            }
        }
        // About 200 each; a lane head start would push one far ahead
        for id in &ids {
            let count = wins.get(id).copied().unwrap_or(0);
            assert!(count > 120 && count < 280, "{} won {} of 600", id, count);
        }
    }

    #[test]
    fn test_from_config() {
        let config = MinerConfig {
            difficulty_pattern: "00".to_string(),
            prefix_window: 6,
            max_attempts: Some(42),
            threads: 4,
            ..MinerConfig::default()
        };
        let miner = Miner::from_config(&config).unwrap();
        assert_eq!(miner.difficulty.pattern(), "00");
        assert_eq!(miner.difficulty.window(), 6);
        assert_eq!(miner.limits.max_attempts, Some(42));
        assert_eq!(miner.reward, Amount::from_num(6.25));
        assert_eq!(miner.threads, 4);
    }
}
