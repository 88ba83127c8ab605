//! tonsign CLI - TON Connect and wallet transfer signing
//!
//! Signs with the account records stored under the base directory. Secret
//! keys are never read from disk: pass them with `--private-key` or the
//! `TONSIGN_PRIVATE_KEY` environment variable.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tonsign_cell::{Address, boc};
use tonsign_signer_lib::{
    AccountRecord, AccountStore, InternalMessage, Network, Outcome, PreparedTransfer,
    SignDataPayload, SignDataResult, Signer, SignerOptions, TonProofChallenge, TonProofReply,
    crc32, get_signer,
};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "tonsign")]
#[command(about = "TON Connect proof, sign-data and transfer signer", long_about = None)]
#[command(version)]
struct Cli {
    /// Account data directory
    #[arg(short = 'd', long = "base-dir", global = true)]
    base_dir: Option<PathBuf>,

    /// Network override (defaults to the account's network)
    #[arg(short = 'n', long, global = true)]
    network: Option<Network>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect stored accounts
    Accounts {
        #[command(subcommand)]
        subcommand: AccountsCommand,
    },
    /// Sign a TON Connect proof
    Proof {
        #[command(flatten)]
        signing: SigningArgs,

        /// Requesting app domain
        #[arg(long)]
        domain: String,

        /// Challenge payload
        #[arg(long, default_value = "")]
        payload: String,

        /// Unix seconds (defaults to now)
        #[arg(long)]
        timestamp: Option<u64>,
    },
    /// Sign a TON Connect sign-data request
    SignData {
        #[command(flatten)]
        signing: SigningArgs,

        /// Requesting app domain
        #[arg(long)]
        domain: String,

        /// Unix seconds (defaults to now)
        #[arg(long)]
        timestamp: Option<u64>,

        /// Text payload
        #[arg(long, conflicts_with_all = ["binary", "cell"])]
        text: Option<String>,

        /// Base64 binary payload
        #[arg(long, conflicts_with = "cell")]
        binary: Option<String>,

        /// Base64 bag of cells payload
        #[arg(long, requires = "schema")]
        cell: Option<String>,

        /// TL-B schema of the cell payload
        #[arg(long)]
        schema: Option<String>,
    },
    /// Sign a wallet transfer
    Transfer {
        #[command(flatten)]
        signing: SigningArgs,

        /// Wallet seqno
        #[arg(long)]
        seqno: u32,

        /// Destination, repeat for several messages
        #[arg(long = "to", required = true)]
        to: Vec<String>,

        /// Amount in nanotons, one per destination
        #[arg(long = "amount", required = true)]
        amount: Vec<u128>,

        /// Text comment attached to every message
        #[arg(long)]
        comment: Option<String>,

        /// Expiry in unix seconds (defaults to now + 600)
        #[arg(long)]
        timeout: Option<u32>,

        /// Bounce on failure
        #[arg(long)]
        bounce: bool,
    },
    /// Print the CRC-32 of a string
    Crc32 {
        /// Input text
        text: String,
    },
}

#[derive(Subcommand)]
enum AccountsCommand {
    /// List stored accounts
    List,
    /// Show account details
    Show {
        /// Account id
        id: String,
    },
}

#[derive(clap::Args)]
struct SigningArgs {
    /// Account id
    account: String,

    /// Hex or base64 private key (32-byte seed or 64-byte secret key)
    #[arg(long, env = "TONSIGN_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Sign with a zero key, e.g. for fee estimation
    #[arg(long)]
    mock: bool,
}

fn list_accounts(store: &AccountStore) -> Result<(), String> {
    let accounts = store
        .load_accounts()
        .map_err(|e| format!("Failed to load accounts: {e}"))?;

    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }

    println!("{:<20} {:<10} {:<8} {:<8} Address", "Id", "Type", "Network", "Version");
    println!("{}", "=".repeat(100));
    for account in &accounts {
        println!(
            "{:<20} {:<10} {:<8} {:<8} {}",
            account.id,
            format!("{:?}", account.kind).to_lowercase(),
            account.network.to_string(),
            account.ton.version.to_string(),
            account.ton.address
        );
    }
    Ok(())
}

fn show_account(store: &AccountStore, id: &str) -> Result<(), String> {
    let account = store.find(id).map_err(|e| e.to_string())?;
    let address = account
        .ton
        .parsed_address()
        .map_err(|e| format!("Invalid address: {e}"))?;

    println!("\nAccount: {}", account.id);
    println!("  Type:       {:?}", account.kind);
    println!("  Network:    {}", account.network);
    println!("  Version:    {}", account.ton.version);
    println!("  Raw:        {}", address.to_raw_string());
    println!("  Address:    {address}");
    if let Some(public_key) = &account.ton.public_key {
        println!("  Public Key: {public_key}");
    }
    if let Some(index) = account.ton.index {
        println!("  Index:      {index}");
    }
    Ok(())
}

fn decode_private_key(encoded: &str) -> Result<Zeroizing<Vec<u8>>, String> {
    let encoded = encoded.trim();
    let bytes = hex::decode(encoded)
        .or_else(|_| STANDARD.decode(encoded))
        .map_err(|_| "Private key must be hex or base64".to_string())?;
    Ok(Zeroizing::new(bytes))
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Account plus the signer built for it
fn load_signer(
    store: &AccountStore,
    network: Option<Network>,
    args: &SigningArgs,
) -> Result<(AccountRecord, Box<dyn Signer>), String> {
    let account = store.find(&args.account).map_err(|e| e.to_string())?;
    let private_key = args
        .private_key
        .as_deref()
        .map(decode_private_key)
        .transpose()?;

    let signer = get_signer(
        &account,
        SignerOptions {
            network: network.unwrap_or(account.network),
            private_key: private_key.as_deref().map(Vec::as_slice),
            mock: args.mock,
            ..SignerOptions::default()
        },
    )
    .map_err(|e| format!("Failed to create signer: {e}"))?;

    log::debug!("Signer for {} is {:?}", account.id, signer.kind());
    Ok((account, signer))
}

/// Unwrap an outcome, turning expected errors into a message for the user
fn expect_outcome<T>(outcome: Outcome<T>) -> Result<T, String> {
    outcome.map_err(|e| format!("{e} ({e:?})"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

async fn sign_proof(
    store: &AccountStore,
    network: Option<Network>,
    args: &SigningArgs,
    challenge: TonProofChallenge,
) -> Result<(), String> {
    let (_, signer) = load_signer(store, network, args)?;
    let signature = signer
        .sign_ton_proof(&challenge)
        .await
        .map_err(|e| format!("Proof signing failed: {e}"))?;
    let signature = expect_outcome(signature)?;

    let reply = TonProofReply::new(&challenge, &signature).map_err(|e| e.to_string())?;
    print_json(&reply)
}

async fn sign_data_request(
    store: &AccountStore,
    network: Option<Network>,
    args: &SigningArgs,
    timestamp: u64,
    domain: &str,
    payload: SignDataPayload,
) -> Result<(), String> {
    let (account, signer) = load_signer(store, network, args)?;
    let address = account
        .ton
        .parsed_address()
        .map_err(|e| format!("Invalid address: {e}"))?;

    let signature = signer
        .sign_data(timestamp, domain, &payload)
        .await
        .map_err(|e| format!("Data signing failed: {e}"))?;
    let signature = expect_outcome(signature)?;

    print_json(&SignDataResult::new(
        &address, timestamp, domain, payload, &signature,
    ))
}

/// Options for the transfer command
struct TransferOptions {
    seqno: u32,
    to: Vec<String>,
    amount: Vec<u128>,
    comment: Option<String>,
    timeout: Option<u32>,
    bounce: bool,
}

fn build_transfer(opts: &TransferOptions) -> Result<PreparedTransfer, String> {
    if opts.to.len() != opts.amount.len() {
        return Err(format!(
            "Got {} destination(s) but {} amount(s)",
            opts.to.len(),
            opts.amount.len()
        ));
    }

    let messages = opts
        .to
        .iter()
        .zip(&opts.amount)
        .map(|(to, amount)| {
            let to = Address::parse(to).map_err(|e| format!("Invalid destination '{to}': {e}"))?;
            let message = InternalMessage::new(to, *amount, opts.bounce);
            match &opts.comment {
                Some(comment) => message.with_comment(comment).map_err(|e| e.to_string()),
                None => Ok(message),
            }
        })
        .collect::<Result<Vec<_>, String>>()?;

    let mut transfer = PreparedTransfer::new(opts.seqno, messages);
    transfer.timeout = opts.timeout;
    Ok(transfer)
}

async fn sign_transfer(
    store: &AccountStore,
    network: Option<Network>,
    args: &SigningArgs,
    opts: &TransferOptions,
) -> Result<(), String> {
    let transfer = build_transfer(opts)?;
    let (account, signer) = load_signer(store, network, args)?;
    let address = account
        .ton
        .parsed_address()
        .map_err(|e| format!("Invalid address: {e}"))?;

    let signed = signer
        .sign_transactions(std::slice::from_ref(&transfer))
        .await
        .map_err(|e| format!("Transfer signing failed: {e}"))?;
    let signed = expect_outcome(signed)?;

    let mut output = Vec::with_capacity(signed.len());
    for transfer in &signed {
        let external = transfer
            .to_external_message(&address, None)
            .map_err(|e| e.to_string())?
            .into_ref();
        output.push(serde_json::json!({
            "seqno": transfer.seqno,
            "body": transfer.to_boc_base64().map_err(|e| e.to_string())?,
            "external": boc::to_base64(&external).map_err(|e| e.to_string())?,
        }));
    }
    print_json(&output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let store = AccountStore::new(cli.base_dir.clone());
    let network = cli.network;

    let result = match cli.command {
        Commands::Accounts { subcommand } => match subcommand {
            AccountsCommand::List => list_accounts(&store),
            AccountsCommand::Show { id } => show_account(&store, &id),
        },
        Commands::Proof {
            signing,
            domain,
            payload,
            timestamp,
        } => {
            let challenge = TonProofChallenge {
                timestamp: timestamp.unwrap_or_else(now),
                domain,
                payload,
            };
            sign_proof(&store, network, &signing, challenge).await
        }
        Commands::SignData {
            signing,
            domain,
            timestamp,
            text,
            binary,
            cell,
            schema,
        } => {
            let payload = match (text, binary, cell, schema) {
                (Some(text), _, _, _) => Ok(SignDataPayload::Text { text }),
                (_, Some(bytes), _, _) => Ok(SignDataPayload::Binary { bytes }),
                (_, _, Some(cell), Some(schema)) => Ok(SignDataPayload::Cell { schema, cell }),
                _ => Err("One of --text, --binary or --cell is required".to_string()),
            };
            match payload {
                Ok(payload) => {
                    let timestamp = timestamp.unwrap_or_else(now);
                    sign_data_request(&store, network, &signing, timestamp, &domain, payload)
                        .await
                }
                Err(e) => Err(e),
            }
        }
        Commands::Transfer {
            signing,
            seqno,
            to,
            amount,
            comment,
            timeout,
            bounce,
        } => {
            let opts = TransferOptions {
                seqno,
                to,
                amount,
                comment,
                timeout,
                bounce,
            };
            sign_transfer(&store, network, &signing, &opts).await
        }
        Commands::Crc32 { text } => {
            println!("{}", crc32(text.as_bytes()));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
