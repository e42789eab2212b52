use crate::{error::MineError, pow, sha256, transaction_root, unix_now, Hash, Transaction};
use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Bytes hashed to produce a block hash: decimal index, decimal timestamp,
/// raw transaction root, decimal nonce, raw previous hash (nothing for genesis).
pub fn header_bytes(
    index: u64,
    timestamp: u64,
    transaction_root: &Hash,
    nonce: u64,
    previous_hash: Option<&Hash>,
) -> Vec<u8> {
    let index = index.to_string();
    let timestamp = timestamp.to_string();
    let nonce = nonce.to_string();
    let mut bytes = Vec::with_capacity(index.len() + timestamp.len() + 32 + nonce.len() + 32);
    bytes.extend_from_slice(index.as_bytes());
    bytes.extend_from_slice(timestamp.as_bytes());
    bytes.extend_from_slice(transaction_root);
    bytes.extend_from_slice(nonce.as_bytes());
    if let Some(previous_hash) = previous_hash {
        bytes.extend_from_slice(previous_hash);
    }
    bytes
}

pub fn header_hash(
    index: u64,
    timestamp: u64,
    transaction_root: &Hash,
    nonce: u64,
    previous_hash: Option<&Hash>,
) -> Hash {
    sha256(&header_bytes(
        index,
        timestamp,
        transaction_root,
        nonce,
        previous_hash,
    ))
}

/// A block still being sealed. Mining consumes the template and yields a [`Block`].
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    pub(crate) index: u64,
    pub(crate) timestamp: u64,
    pub(crate) transaction_root: Hash,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) nonce: u64,
    pub(crate) hash: Hash,
    pub(crate) previous_hash: Option<Hash>,
}

impl BlockTemplate {
    /// Stamps the current time, starts the nonce at 0 and seals. The resulting
    /// hash is not checked against any difficulty.
    pub fn new(transactions: Vec<Transaction>, previous_hash: Option<Hash>, index: u64) -> Self {
        let mut template = Self {
            index,
            timestamp: unix_now(),
            transaction_root: [0u8; 32],
            transactions,
            nonce: 0,
            hash: [0u8; 32],
            previous_hash,
        };
        template.seal();
        template
    }

    /// Recomputes the block hash. Refreshes the cached transaction root as a side effect.
    pub fn compute_hash(&mut self) -> Hash {
        self.transaction_root = transaction_root(&self.transactions);
        header_hash(
            self.index,
            self.timestamp,
            &self.transaction_root,
            self.nonce,
            self.previous_hash.as_ref(),
        )
    }

    pub fn seal(&mut self) {
        self.hash = self.compute_hash();
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Searches nonces in increasing order until the hash has at least
    /// `difficulty` leading hex zeros. Blocks until a nonce is found.
    pub fn mine(mut self, difficulty: u32) -> Block {
        debug!(index = self.index, difficulty, "start mining block");
        loop {
            self.seal();
            if pow::meets_difficulty(&self.hash, difficulty) {
                return self.finish_mining();
            }
            self.advance();
        }
    }

    /// Like [`BlockTemplate::mine`], but gives up once `stop` is set.
    pub fn mine_interruptible(
        mut self,
        difficulty: u32,
        stop: &AtomicBool,
    ) -> Result<Block, MineError> {
        debug!(index = self.index, difficulty, "start interruptible mining");
        let mut attempts = 0u64;
        loop {
            if stop.load(Ordering::Relaxed) {
                debug!(index = self.index, attempts, "mining interrupted");
                return Err(MineError::Interrupted {
                    index: self.index,
                    attempts,
                });
            }
            self.seal();
            attempts += 1;
            if pow::meets_difficulty(&self.hash, difficulty) {
                return Ok(self.finish_mining());
            }
            self.advance();
        }
    }

    /// Seals without any proof-of-work. Used for the genesis block.
    pub fn into_block(self) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transaction_root: self.transaction_root,
            transactions: self.transactions,
            nonce: self.nonce,
            hash: self.hash,
            previous_hash: self.previous_hash,
        }
    }

    fn advance(&mut self) {
        self.timestamp = unix_now();
        self.nonce = self.nonce.wrapping_add(1);
    }

    pub(crate) fn finish_mining(self) -> Block {
        info!(
            "Mined block {} with nonce {} and hash {}",
            self.index,
            self.nonce,
            hex::encode(self.hash)
        );
        self.into_block()
    }
}

fn serialize_previous_hash<S: Serializer>(
    previous_hash: &Option<Hash>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&previous_hash.map(hex::encode).unwrap_or_default())
}

/// A sealed block. Fields are read-only outside the crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) timestamp: u64,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub(crate) transaction_root: Hash,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) nonce: u64,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub(crate) hash: Hash,
    #[serde(serialize_with = "serialize_previous_hash")]
    pub(crate) previous_hash: Option<Hash>,
}

impl Block {
    /// No transactions, no predecessor, never mined.
    pub fn genesis() -> Self {
        BlockTemplate::new(vec![], None, 0).into_block()
    }

    /// Recomputes the hash from the current fields, including the transaction root.
    pub fn compute_hash(&self) -> Hash {
        header_hash(
            self.index,
            self.timestamp,
            &transaction_root(&self.transactions),
            self.nonce,
            self.previous_hash.as_ref(),
        )
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transaction_root(&self) -> &Hash {
        &self.transaction_root
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// `None` for the genesis block.
    pub fn previous_hash(&self) -> Option<&Hash> {
        self.previous_hash.as_ref()
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::with_timestamp("Alice", "Bob", 10, 1_600_000_000),
            Transaction::with_timestamp("Bob", "Charlie", 5, 1_600_000_100),
        ]
    }

    /// Template with every field pinned so hashes are reproducible.
    fn fixed_template() -> BlockTemplate {
        let mut template = BlockTemplate::new(sample_txs(), Some([0u8; 32]), 1);
        template.timestamp = 1_600_000_200;
        template.seal();
        template
    }

    #[test]
    fn header_bytes_layout() {
        let bytes = header_bytes(12, 345, &[1u8; 32], 6, Some(&[2u8; 32]));
        assert_eq!(bytes.len(), 2 + 3 + 32 + 1 + 32);
        assert_eq!(&bytes[0..5], b"12345");
        assert_eq!(&bytes[5..37], &[1u8; 32]);
        assert_eq!(&bytes[37..38], b"6");
        assert_eq!(&bytes[38..70], &[2u8; 32]);
    }

    #[test]
    fn header_bytes_without_previous_hash() {
        let bytes = header_bytes(0, 7, &[1u8; 32], 0, None);
        assert_eq!(bytes.len(), 1 + 1 + 32 + 1);
    }

    #[test]
    fn block_hash_example() {
        let template = fixed_template();
        assert_eq!(
            hex::encode(template.hash()),
            "482e2bc0b269b7ba60b9d6e230619a97dbd8380a9f0b7c1157ac7b00ce9aa90d"
        );
        assert_eq!(
            hex::encode(template.transaction_root),
            "ab9d4d1563e89f8dda926d4073561b753155f0f116527392177048c26428d82b"
        );
    }

    #[test]
    fn genesis_hash_example() {
        let mut template = BlockTemplate::new(vec![], None, 0);
        template.timestamp = 1_600_000_000;
        template.seal();
        assert_eq!(
            hex::encode(template.hash()),
            "d212cdcc371cb4f0cf92ac8bdd6708311b683b5ddd9f5de298821d2f9a6cbc5c"
        );
    }

    #[test]
    fn compute_hash_is_deterministic() {
        let mut template = fixed_template();
        let first = template.compute_hash();
        let second = template.compute_hash();
        assert_eq!(first, second);
        let block = template.into_block();
        assert_eq!(block.compute_hash(), block.compute_hash());
        assert_eq!(&block.compute_hash(), block.hash());
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let mut template = fixed_template();
        let before = *template.hash();
        template.nonce += 1;
        template.seal();
        assert_ne!(before, *template.hash());
        assert_eq!(
            hex::encode(template.hash()),
            "baee2b14e9d0f7be25aa0d9d528d94e0d389720db58f3d11c0465b4f1d27029d"
        );
    }

    #[test]
    fn seal_refreshes_transaction_root() {
        let mut template = BlockTemplate::new(vec![], None, 3);
        let empty_root = template.transaction_root;
        template.transactions = sample_txs();
        template.seal();
        assert_ne!(template.transaction_root, empty_root);
        assert_eq!(template.transaction_root, transaction_root(&sample_txs()));
    }

    #[test]
    fn new_template_starts_at_nonce_zero() {
        let template = BlockTemplate::new(sample_txs(), Some([7u8; 32]), 5);
        assert_eq!(template.nonce(), 0);
        assert_eq!(template.index(), 5);
        assert!(template.timestamp > 0);
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), None);
        assert_eq!(genesis.nonce(), 0);
        assert!(genesis.transactions().is_empty());
        assert_eq!(genesis.transaction_root(), &transaction_root(&[]));
        assert_eq!(&genesis.compute_hash(), genesis.hash());
    }

    #[test]
    fn mine_block_satisfies_difficulty() {
        for difficulty in 0..=4 {
            let block = BlockTemplate::new(sample_txs(), Some([0u8; 32]), 1).mine(difficulty);
            assert!(block.meets_difficulty(difficulty));
            assert!(block.hash_hex().starts_with(&"0".repeat(difficulty as usize)));
            assert_eq!(block.hash_hex().len(), crate::constants::HASH_HEX_SIZE);
            assert_eq!(&block.compute_hash(), block.hash());
        }
    }

    #[test]
    fn mine_difficulty_zero_keeps_first_nonce() {
        let block = BlockTemplate::new(sample_txs(), None, 1).mine(0);
        assert_eq!(block.nonce(), 0);
    }

    #[test]
    fn mine_empty_block() {
        let block = BlockTemplate::new(vec![], Some([9u8; 32]), 1).mine(2);
        assert!(block.hash_hex().starts_with("00"));
        assert_eq!(block.transaction_root(), &transaction_root(&[]));
        assert_eq!(&block.compute_hash(), block.hash());
    }

    #[test]
    fn mine_interruptible_honours_stop_flag() {
        let stop = AtomicBool::new(true);
        let err = BlockTemplate::new(sample_txs(), None, 4)
            .mine_interruptible(64, &stop)
            .unwrap_err();
        assert_eq!(
            err,
            MineError::Interrupted {
                index: 4,
                attempts: 0
            }
        );
    }

    #[test]
    fn mine_interruptible_completes_when_not_stopped() {
        let stop = AtomicBool::new(false);
        let block = BlockTemplate::new(sample_txs(), None, 4)
            .mine_interruptible(2, &stop)
            .unwrap();
        assert!(block.hash_hex().starts_with("00"));
    }

    #[test]
    fn block_serialization_example() {
        let block = fixed_template().into_block();
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["index"], 1);
        assert_eq!(json["nonce"], 0);
        assert_eq!(
            json["hash"],
            "482e2bc0b269b7ba60b9d6e230619a97dbd8380a9f0b7c1157ac7b00ce9aa90d"
        );
        assert_eq!(json["previous_hash"], "00".repeat(32));
        assert_eq!(json["transactions"].as_array().unwrap().len(), 2);

        let genesis = serde_json::to_value(Block::genesis()).unwrap();
        assert_eq!(genesis["previous_hash"], "");
    }
}
