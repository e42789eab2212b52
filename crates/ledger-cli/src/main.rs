mod report;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{constants::DEFAULT_DIFFICULTY, pow, Blockchain, Transaction};
use ledger_crypto::{Rsa, SignatureScheme, DEFAULT_KEY_BITS};
use report::{ChainReport, SignatureReport};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Build and inspect a minimal proof-of-work ledger")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine the demo transactions into a chain and print it
    Demo {
        /// Leading hex zeros required of every mined block
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Spread each nonce search over all cores
        #[arg(long)]
        parallel: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Sign the head hash with a fresh RSA key and verify the signature
        #[arg(long)]
        sign: bool,
        /// RSA key size used with --sign
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        key_bits: usize,
    },
    /// Search for a nonce that gives `nonce ++ data` a hash with leading zeros
    Pow {
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        #[arg(long, default_value = "Light Alex")]
        data: String,
    },
}

fn demo_batches() -> Vec<Vec<Transaction>> {
    vec![
        vec![
            Transaction::new("Alice", "Bob", 100),
            Transaction::new("Bob", "Charlie", 50),
        ],
        vec![Transaction::new("Charlie", "Dave", 20)],
        vec![Transaction::new("Dave", "Eve", 10)],
    ]
}

fn sign_head(chain: &Blockchain, key_bits: usize) -> Result<SignatureReport> {
    let keys = Rsa::generate_key_pair(key_bits).context("generating RSA key pair")?;
    let message = chain.head().hash_hex();
    let signature = Rsa::sign(&keys.private_key, message.as_bytes()).context("signing head hash")?;
    Rsa::verify(&keys.public_key, message.as_bytes(), &signature)
        .context("verifying head hash signature")?;
    Ok(SignatureReport {
        message,
        signature: signature.to_hex(),
        verified: true,
    })
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo {
            difficulty,
            parallel,
            json,
            sign,
            key_bits,
        } => {
            info!(difficulty, parallel, "building demo chain");
            let mut chain = Blockchain::with_difficulty(difficulty);
            for batch in demo_batches() {
                if parallel {
                    chain.add_block_parallel(batch);
                } else {
                    chain.add_block(batch);
                }
            }
            ensure!(chain.is_valid(), "demo chain failed validation");

            let signature = if sign {
                Some(sign_head(&chain, key_bits)?)
            } else {
                None
            };
            let report = ChainReport::new(&chain, signature);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
        Command::Pow { difficulty, data } => {
            let outcome = pow::mine_data(difficulty, &data);
            println!(
                "mining completed for difficulty {difficulty}, hash content: {}, hash value: {}, cost time: {:?}",
                outcome.content, outcome.hash, outcome.elapsed
            );
        }
    }
    Ok(())
}
