use ledger_core::{Block, Blockchain};
use serde::Serialize;

const RULE: &str = "=======================================================";
const THIN_RULE: &str = "-------------------------------------------------------";

#[derive(Serialize)]
pub struct SignatureReport {
    pub message: String,
    pub signature: String,
    pub verified: bool,
}

#[derive(Serialize)]
pub struct ChainReport<'a> {
    valid: bool,
    meets_difficulty: bool,
    difficulty: u32,
    blocks: &'a [Block],
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<SignatureReport>,
}

impl<'a> ChainReport<'a> {
    pub fn new(chain: &'a Blockchain, signature: Option<SignatureReport>) -> Self {
        Self {
            valid: chain.is_valid(),
            meets_difficulty: chain.meets_difficulty(),
            difficulty: chain.difficulty(),
            blocks: chain.blocks(),
            signature,
        }
    }

    pub fn print(&self) {
        println!("Blockchain is valid: {}", self.valid);
        println!("Blockchain difficulty: {}", self.difficulty);
        println!("{RULE}\n");
        for block in self.blocks {
            print_block(block);
        }
        if let Some(sig) = &self.signature {
            println!("Signed head hash: {}", sig.message);
            println!("RSA signature: {}", sig.signature);
            println!("Signature verified: {}", sig.verified);
        }
    }
}

fn print_block(block: &Block) {
    println!("Block index: {}", block.index());
    println!("Block timestamp: {}", block.timestamp());
    println!(
        "Block prev hash: {}",
        block.previous_hash().map(hex::encode).unwrap_or_default()
    );
    println!("Block hash: {}", block.hash_hex());
    println!("Block nonce: {}", block.nonce());
    println!("Block transactions:");
    for tx in block.transactions() {
        println!("{THIN_RULE}");
        println!("Transaction From: {}", hex::encode(&tx.sender));
        println!("Transaction To: {}", hex::encode(&tx.recipient));
        println!("Transaction Amount: {}", tx.amount);
        println!("Transaction Timestamp: {}", tx.timestamp);
    }
    println!("{RULE}");
}
