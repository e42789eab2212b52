use crate::{
    constants::DEFAULT_DIFFICULTY, error::ChainError, Block, BlockTemplate, Transaction,
};
use tracing::{debug, warn};

/// An append-only sequence of blocks anchored by a genesis block.
///
/// The difficulty is fixed when the chain is created. Blocks are only ever
/// pushed to the end; nothing is removed or reordered.
#[derive(Clone, Debug)]
pub struct Blockchain {
    difficulty: u32,
    blocks: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    /// The genesis block is sealed but never mined against `difficulty`.
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            blocks: vec![Block::genesis()],
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn head(&self) -> &Block {
        // never empty: construction always pushes genesis
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Mines a block holding `transactions` on top of the current head and
    /// appends it. Blocks the caller until a nonce is found.
    pub fn add_block(&mut self, transactions: Vec<Transaction>) -> &Block {
        let block = self.candidate(transactions).mine(self.difficulty);
        self.push(block)
    }

    /// Same as [`Blockchain::add_block`] with the nonce search spread over threads.
    pub fn add_block_parallel(&mut self, transactions: Vec<Transaction>) -> &Block {
        let block = self.candidate(transactions).mine_parallel(self.difficulty);
        self.push(block)
    }

    /// Structural integrity: every block after genesis hashes to its stored hash
    /// and links to its predecessor. Proof-of-work is not checked here; see
    /// [`Blockchain::meets_difficulty`].
    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    /// The checks of [`Blockchain::is_valid`], reporting the first failure.
    pub fn verify(&self) -> Result<(), ChainError> {
        for pair in self.blocks.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.compute_hash() != current.hash {
                warn!(index = current.index, "stored hash does not match contents");
                return Err(ChainError::HashMismatch {
                    index: current.index,
                });
            }
            if current.previous_hash != Some(previous.hash) {
                warn!(index = current.index, "broken link to previous block");
                return Err(ChainError::BrokenLink {
                    index: current.index,
                });
            }
        }
        Ok(())
    }

    /// Whether every block after genesis satisfies the chain difficulty.
    pub fn meets_difficulty(&self) -> bool {
        self.blocks
            .iter()
            .skip(1)
            .all(|block| block.meets_difficulty(self.difficulty))
    }

    fn candidate(&self, transactions: Vec<Transaction>) -> BlockTemplate {
        let head = self.head();
        BlockTemplate::new(transactions, Some(head.hash), head.index + 1)
    }

    fn push(&mut self, block: Block) -> &Block {
        debug!(index = block.index, txs = block.transactions.len(), "appending block");
        self.blocks.push(block);
        self.head()
    }
}
