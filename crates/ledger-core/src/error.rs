use thiserror::Error;

/// Why a chain failed `Blockchain::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block {index}: stored hash does not match recomputed hash")]
    HashMismatch { index: u64 },
    #[error("block {index}: previous hash does not match hash of block {}", .index - 1)]
    BrokenLink { index: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MineError {
    #[error("mining of block {index} interrupted after {attempts} attempts")]
    Interrupted { index: u64, attempts: u64 },
}
