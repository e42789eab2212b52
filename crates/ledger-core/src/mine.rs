use crate::{
    block::header_hash, pow::meets_difficulty, transaction_root, unix_now, Block, BlockTemplate,
};
use rayon::prelude::*;
use tracing::{debug, info};

impl BlockTemplate {
    /// Mines the template by searching nonces in parallel until the header hash has
    /// at least `difficulty` leading hex zeros.
    ///
    /// The timestamp is frozen for the duration of a search so that every attempt
    /// hashes the same header apart from the nonce. `find_first` makes the lowest
    /// satisfying nonce the winner regardless of thread scheduling, so the result
    /// is the one a sequential search at that timestamp would produce.
    pub fn mine_parallel(mut self, difficulty: u32) -> Block {
        debug!(index = self.index, difficulty, "start parallel mining");
        self.transaction_root = transaction_root(&self.transactions);
        loop {
            self.timestamp = unix_now();

            let (index, timestamp, root, previous_hash) = (
                self.index,
                self.timestamp,
                self.transaction_root,
                self.previous_hash,
            );
            // Rayon splits the nonce range across threads.
            let found = (0u64..u64::MAX).into_par_iter().find_first(|nonce| {
                let hash = header_hash(index, timestamp, &root, *nonce, previous_hash.as_ref());
                meets_difficulty(&hash, difficulty)
            });

            match found {
                Some(nonce) => {
                    self.nonce = nonce;
                    self.seal();
                    info!(index, nonce, "parallel search found nonce");
                    return self.finish_mining();
                }
                None => debug!(index, timestamp, "nonce space exhausted, retrying"),
            }
        }
    }
}
