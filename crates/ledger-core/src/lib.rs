pub mod block;
pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;

pub use block::{Block, BlockTemplate};
pub use chain::Blockchain;
pub use error::{ChainError, MineError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Hash = [u8; 32];

pub(crate) fn sha256(bytes: &[u8]) -> Hash {
    Sha256::digest(bytes).into()
}

/// Seconds since the Unix epoch. A clock set before 1970 reads as 0.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// A transfer between two opaque identities. Nothing about the fields is validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "hex::serde")]
    pub sender: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub recipient: Vec<u8>,
    pub amount: i64,
    pub timestamp: u64,
}

impl Transaction {
    /// Creates a transaction stamped with the current time.
    pub fn new(sender: impl Into<Vec<u8>>, recipient: impl Into<Vec<u8>>, amount: i64) -> Self {
        Self::with_timestamp(sender, recipient, amount, unix_now())
    }

    pub fn with_timestamp(
        sender: impl Into<Vec<u8>>,
        recipient: impl Into<Vec<u8>>,
        amount: i64,
        timestamp: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp,
        }
    }

    /// sender ++ recipient ++ decimal amount ++ decimal timestamp
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let amount = self.amount.to_string();
        let timestamp = self.timestamp.to_string();
        let mut bytes = Vec::with_capacity(
            self.sender.len() + self.recipient.len() + amount.len() + timestamp.len(),
        );
        bytes.extend_from_slice(&self.sender);
        bytes.extend_from_slice(&self.recipient);
        bytes.extend_from_slice(amount.as_bytes());
        bytes.extend_from_slice(timestamp.as_bytes());
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(&self.canonical_bytes())
    }
}

/// Digest committing to the transactions and their order: each transaction is
/// hashed on its own, then the concatenated digests are hashed once more.
/// An empty batch yields the digest of the empty byte string.
pub fn transaction_root(txs: &[Transaction]) -> Hash {
    let mut concatenated = Vec::with_capacity(txs.len() * constants::HASH_SIZE);
    for tx in txs {
        concatenated.extend_from_slice(&tx.hash());
    }
    sha256(&concatenated)
}

pub mod pow {
    use super::{sha256, Hash};
    use std::time::{Duration, Instant};
    use tracing::info;

    /// Number of leading `'0'` characters in the lowercase hex form of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        count_leading_zero_nibbles(hash) >= difficulty
    }

    /// Result of a proof-of-work search over free-form data.
    #[derive(Clone, Debug)]
    pub struct PowOutcome {
        /// The hashed preimage: decimal nonce followed by the data.
        pub content: String,
        /// Hex digest of `content`.
        pub hash: String,
        pub nonce: u64,
        pub elapsed: Duration,
    }

    /// Searches nonces from 0 upwards until `sha256(nonce ++ data)` has at
    /// least `difficulty` leading hex zeros.
    pub fn mine_data(difficulty: u32, data: &str) -> PowOutcome {
        let start = Instant::now();
        let mut nonce = 0u64;
        loop {
            let content = format!("{nonce}{data}");
            let digest = sha256(content.as_bytes());
            if meets_difficulty(&digest, difficulty) {
                let elapsed = start.elapsed();
                info!(difficulty, nonce, ?elapsed, "data proof-of-work found");
                return PowOutcome {
                    content,
                    hash: hex::encode(digest),
                    nonce,
                    elapsed,
                };
            }
            nonce = nonce.wrapping_add(1);
        }
    }
}
