//! SHADE CLI
//!
//! Command-line interface for the SHADE stealth payment protocol.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shade_core::traits::RecipientDirectory;
use shade_core::types::{parse_address, ChainConfig, LookupOptions, PublicKeyBytes, RecipientKeys, TxHandle};
use shade_core::{Address, Bytes, NATIVE_TOKEN, U256};
use shade_crypto::{
    parse_hook_data, sign_withdraw, Denylist, KeyPair, LocalSigner, RandomNumber, RawWithdrawAuthorization,
    RecoverableSignature, WithdrawAuthorization,
};
use shade_directory::{DirectoryConfig, JsonRpcLedger, RpcConfig, StealthKeyRegistry};
use shade_protocol::{ProtocolConfig, ScanOverrides, SendOptions, ShadeProtocol, WithdrawOptions};
use shade_registry::{ChainRegistry, MemoryDirectory};
use shade_scanner::GraphQlIndexer;
use shade_stealth::{generate_private_keys, ShadeKeys, StealthPaymentBuilder};

/// SHADE - Stealth Payments for EVM Ledgers
#[derive(Parser)]
#[command(name = "shade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that talks to a chain.
#[derive(clap::Args)]
struct ChainArgs {
    /// Chain ID
    #[arg(long, env = "SHADE_CHAIN_ID", default_value = "1")]
    chain_id: u64,
    /// JSON-RPC endpoint
    #[arg(long, env = "SHADE_RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,
    /// JSON file of custom chain records
    #[arg(long)]
    chains: Option<PathBuf>,
    /// Indexer GraphQL endpoint (overrides the chain record)
    #[arg(long)]
    indexer: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive spending and viewing keys
    Keys {
        /// Wallet private key to derive from; random keys if omitted
        #[arg(long, env = "SHADE_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,
        /// Chain ID baked into the signed message
        #[arg(long, env = "SHADE_CHAIN_ID", default_value = "1")]
        chain_id: u64,
        /// Output file for keys (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Prepare a stealth payment offline
    Stealth {
        /// Recipient spending public key (uncompressed hex)
        spending_public_key: String,
        /// Recipient viewing public key (uncompressed hex)
        viewing_public_key: String,
        /// Fixed random number (hex); drawn securely if omitted
        #[arg(long)]
        random_number: Option<String>,
        /// JSON array of addresses payments must never land on
        #[arg(long)]
        denylist: Option<PathBuf>,
    },

    /// Send a stealth payment
    Send {
        /// Recipient address, public key or transaction hash
        recipient: String,
        /// Amount in base units
        amount: String,
        /// Sending account (node-managed)
        #[arg(long)]
        from: String,
        /// Token contract; native currency if omitted
        #[arg(long)]
        token: Option<String>,
        /// StealthKeyRegistry contract used to resolve addresses
        #[arg(long)]
        registry: Option<String>,
        /// JSON array of addresses payments must never land on
        #[arg(long)]
        denylist: Option<PathBuf>,
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Scan announcements for payments
    Scan {
        /// Path to keys file
        #[arg(short, long)]
        keys: PathBuf,
        /// First block to scan
        #[arg(long)]
        start_block: Option<u64>,
        /// Last block to scan
        #[arg(long)]
        end_block: Option<u64>,
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Withdraw from a stealth address
    Withdraw {
        /// Stealth private key
        #[arg(long, env = "SHADE_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// Destination address
        destination: String,
        /// Token contract; native currency if omitted
        #[arg(long)]
        token: Option<String>,
        /// Gas price in base units; read from the node if omitted
        #[arg(long)]
        gas_price: Option<String>,
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Sign a relayed withdrawal
    SignWithdraw {
        /// Stealth private key
        #[arg(long, env = "SHADE_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// Destination address
        acceptor: String,
        /// Token contract
        token: String,
        /// Relayer address
        sponsor: String,
        /// Relayer fee in base units
        fee: String,
        /// Hook contract called after the withdrawal
        #[arg(long)]
        hook: Option<String>,
        /// 0x-prefixed hook call data
        #[arg(long, requires = "hook")]
        hook_data: Option<String>,
        /// Chain ID
        #[arg(long, env = "SHADE_CHAIN_ID", default_value = "1")]
        chain_id: u64,
        /// JSON file of custom chain records
        #[arg(long)]
        chains: Option<PathBuf>,
    },

    /// Relay a withdrawal signed with sign-withdraw
    Relay {
        /// JSON file written by sign-withdraw
        file: PathBuf,
        /// Relaying account (node-managed)
        #[arg(long)]
        from: String,
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// List known chain deployments
    Chains {
        /// JSON file of custom chain records
        #[arg(long)]
        chains: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "shade=debug,info"
    } else {
        "shade=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Keys {
            private_key,
            chain_id,
            output,
        } => cmd_keys(private_key.as_deref(), chain_id, output).await,
        Commands::Stealth {
            spending_public_key,
            viewing_public_key,
            random_number,
            denylist,
        } => cmd_stealth(
            &spending_public_key,
            &viewing_public_key,
            random_number.as_deref(),
            denylist.as_deref(),
        ),
        Commands::Send {
            recipient,
            amount,
            from,
            token,
            registry,
            denylist,
            chain,
        } => {
            cmd_send(
                &recipient,
                &amount,
                &from,
                token.as_deref(),
                registry.as_deref(),
                denylist.as_deref(),
                &chain,
            )
            .await
        }
        Commands::Scan {
            keys,
            start_block,
            end_block,
            chain,
        } => {
            let overrides = ScanOverrides {
                start_block,
                end_block,
            };
            cmd_scan(&keys, overrides, &chain).await
        }
        Commands::Withdraw {
            private_key,
            destination,
            token,
            gas_price,
            chain,
        } => cmd_withdraw(&private_key, &destination, token.as_deref(), gas_price.as_deref(), &chain).await,
        Commands::SignWithdraw {
            private_key,
            acceptor,
            token,
            sponsor,
            fee,
            hook,
            hook_data,
            chain_id,
            chains,
        } => {
            let chain = load_chain(chain_id, chains.as_deref(), None)?;
            cmd_sign_withdraw(
                &chain,
                &private_key,
                &acceptor,
                &token,
                &sponsor,
                &fee,
                hook.as_deref(),
                hook_data.as_deref(),
            )
        }
        Commands::Relay { file, from, chain } => cmd_relay(&file, &from, &chain).await,
        Commands::Chains { chains } => cmd_chains(chains.as_deref()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn load_chain(chain_id: u64, chains_file: Option<&Path>, indexer: Option<&str>) -> Result<ChainConfig> {
    let mut registry = ChainRegistry::with_defaults();
    if let Some(path) = chains_file {
        registry
            .load_file(path)
            .with_context(|| format!("Failed to load chain records from {}", path.display()))?;
    }
    if let Some(endpoint) = indexer {
        registry
            .set_indexer_endpoint(chain_id, Some(endpoint.to_string()))
            .context("Invalid indexer endpoint")?;
    }
    let chain = registry
        .get(chain_id)
        .with_context(|| format!("Unknown chain {chain_id}"))?;
    debug!(chain_id, start_block = chain.start_block, "Loaded chain record");
    Ok(chain.clone())
}

fn load_denylist(path: Option<&Path>) -> Result<Denylist> {
    match path {
        Some(path) => Denylist::from_file(path)
            .with_context(|| format!("Failed to load denylist from {}", path.display())),
        None => Ok(Denylist::default()),
    }
}

fn parse_amount(s: &str) -> Result<U256> {
    U256::from_str_radix(s.trim(), 10).with_context(|| format!("Invalid amount '{s}'"))
}

fn parse_token(token: Option<&str>) -> Result<Address> {
    match token {
        Some(token) => parse_address(token).context("Invalid token address"),
        None => Ok(NATIVE_TOKEN),
    }
}

fn connect(
    args: &ChainArgs,
    directory: Option<Arc<dyn RecipientDirectory>>,
    denylist: Denylist,
) -> Result<ShadeProtocol> {
    let chain = load_chain(args.chain_id, args.chains.as_deref(), args.indexer.as_deref())?;
    let ledger = Arc::new(
        JsonRpcLedger::with_config(RpcConfig::new(args.rpc_url.clone()).with_chain_id(args.chain_id))
            .context("Failed to create RPC client")?,
    );
    let directory = directory.unwrap_or_else(|| Arc::new(MemoryDirectory::new()));

    let mut builder = ShadeProtocol::builder(ProtocolConfig::new(chain))
        .ledger(ledger.clone())
        .submitter(ledger.clone())
        .directory(directory)
        .denylist(denylist);
    if args.indexer.is_some() {
        builder = builder.indexer(Arc::new(GraphQlIndexer::new().context("Failed to create indexer client")?));
    }
    Ok(builder.build()?)
}

/// Output of `sign-withdraw` and input of `relay`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedWithdrawal {
    stealth_address: String,
    authorization: RawWithdrawAuthorization,
    signature: RecoverableSignature,
}

impl SignedWithdrawal {
    fn sign(stealth: &KeyPair, authorization: &WithdrawAuthorization) -> Result<Self> {
        let signature = sign_withdraw(stealth, authorization)?;
        let hook = authorization.has_hook();
        Ok(Self {
            stealth_address: stealth.checksum_address(),
            authorization: RawWithdrawAuthorization {
                chain_id: authorization.chain_id.to_string(),
                contract: authorization.contract.to_checksum(None),
                acceptor: authorization.acceptor.to_checksum(None),
                token: authorization.token.to_checksum(None),
                sponsor: authorization.sponsor.to_checksum(None),
                sponsor_fee: authorization.sponsor_fee.to_string(),
                hook: hook.then(|| authorization.hook.to_checksum(None)),
                hook_data: hook.then(|| authorization.hook_data.to_string()),
            },
            signature,
        })
    }
}

async fn relay(protocol: &ShadeProtocol, signed: &SignedWithdrawal, relayer: Address) -> Result<TxHandle> {
    let stealth_address = parse_address(&signed.stealth_address).context("Invalid stealth address")?;
    let authorization =
        WithdrawAuthorization::try_from(&signed.authorization).context("Invalid withdrawal authorization")?;
    protocol
        .withdraw_on_behalf(relayer, stealth_address, &authorization, &signed.signature)
        .await
        .context("Relayed withdrawal failed")
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Derive or generate keys
async fn cmd_keys(private_key: Option<&str>, chain_id: u64, output: Option<PathBuf>) -> Result<()> {
    let keys = match private_key {
        Some(private_key) => {
            println!("{}", "🔑 Deriving SHADE keys from wallet signature...".cyan().bold());
            let signer = LocalSigner::from_private_key(private_key, chain_id).context("Invalid private key")?;
            generate_private_keys(&signer).await?
        }
        None => {
            println!("{}", "🔑 Generating random SHADE keys...".cyan().bold());
            ShadeKeys::generate()
        }
    };

    let keys_json = serde_json::json!({
        "spendingPublicKey": keys.spending.public_key_hex(),
        "viewingPublicKey": keys.viewing.public_key_hex(),
        "spendingPrivateKey": keys.spending.private_key_hex(),
        "viewingPrivateKey": keys.viewing.private_key_hex(),
    });

    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(&keys_json)?)?;
        println!("{} {}", "✅ Keys saved to:".green(), path.display());
    } else {
        println!("\n{}", "Keys (JSON):".yellow().bold());
        println!("{}", serde_json::to_string_pretty(&keys_json)?);
    }

    println!("\n{}", "⚠️  IMPORTANT: Keep your private keys safe!".red().bold());
    println!("   The spending key controls funds; the viewing key reveals them.");

    Ok(())
}

/// Prepare a stealth payment without submitting it
fn cmd_stealth(
    spending_public_key: &str,
    viewing_public_key: &str,
    random_number: Option<&str>,
    denylist: Option<&Path>,
) -> Result<()> {
    let recipient = RecipientKeys::new(
        PublicKeyBytes::from_hex(spending_public_key).context("Invalid spending public key")?,
        PublicKeyBytes::from_hex(viewing_public_key).context("Invalid viewing public key")?,
    );

    let mut builder = StealthPaymentBuilder::new()
        .recipient(recipient)
        .denylist(load_denylist(denylist)?);
    if let Some(random_number) = random_number {
        builder = builder.random_number(RandomNumber::from_hex(random_number).context("Invalid random number")?);
    }
    let payment = builder.build().context("Failed to prepare stealth payment")?;

    println!("\n{}", "✅ Stealth payment prepared:".green().bold());
    println!("   {} {}", "Address:".yellow(), payment.stealth_address.to_checksum(None));
    println!("   {} {}", "pkx:".dimmed(), payment.pkx());
    println!("   {} {}", "Ciphertext:".dimmed(), payment.ciphertext());

    println!("\n{}", "ℹ️  Next steps:".cyan());
    println!("   1. Call sendEth or sendToken with the values above");
    println!("   2. The recipient finds the payment by scanning");

    Ok(())
}

/// Send a stealth payment through the node
async fn cmd_send(
    recipient: &str,
    amount: &str,
    from: &str,
    token: Option<&str>,
    registry: Option<&str>,
    denylist: Option<&Path>,
    args: &ChainArgs,
) -> Result<()> {
    println!("{} {}", "💸 Sending stealth payment to:".cyan().bold(), recipient);

    let amount = parse_amount(amount)?;
    let token = parse_token(token)?;
    let sender = parse_address(from).context("Invalid sender address")?;

    let mut lookup = LookupOptions {
        support_pub_key: true,
        support_tx_hash: true,
        ..LookupOptions::default()
    };

    let chain = load_chain(args.chain_id, args.chains.as_deref(), args.indexer.as_deref())?;
    let directory: Option<Arc<dyn RecipientDirectory>> = match registry {
        Some(registry) => {
            lookup.advanced = true;
            let ledger = Arc::new(
                JsonRpcLedger::with_config(RpcConfig::new(args.rpc_url.clone()).with_chain_id(chain.chain_id))
                    .context("Failed to create RPC client")?,
            );
            let registry = parse_address(registry).context("Invalid registry address")?;
            Some(Arc::new(StealthKeyRegistry::new(ledger, DirectoryConfig::new(registry))))
        }
        None => None,
    };

    let protocol = connect(args, directory, load_denylist(denylist)?)?;
    let options = SendOptions {
        lookup,
        ..SendOptions::default()
    };
    let receipt = protocol
        .send(sender, recipient, token, amount, options)
        .await
        .context("Failed to send payment")?;

    println!("\n{}", "✅ Payment submitted:".green().bold());
    println!("   {} {}", "Transaction:".yellow(), receipt.tx.hash);
    println!("   {} {}", "Stealth address:".dimmed(), receipt.stealth_key.checksum_address());

    Ok(())
}

/// Scan for payments
async fn cmd_scan(keys_path: &Path, overrides: ScanOverrides, args: &ChainArgs) -> Result<()> {
    println!("{}", "🔎 Scanning for payments...".cyan().bold());

    let keys_json: serde_json::Value = serde_json::from_reader(
        std::fs::File::open(keys_path).context("Failed to open keys file")?,
    )?;
    let spending = KeyPair::from_public_key(
        keys_json["spendingPublicKey"]
            .as_str()
            .context("Missing spendingPublicKey")?,
    )?;
    let viewing = KeyPair::from_private_key(
        keys_json["viewingPrivateKey"]
            .as_str()
            .context("Missing viewingPrivateKey")?,
    )?;

    let protocol = connect(args, None, Denylist::default())?;

    let pb = spinner("Fetching and matching announcements")?;
    let report = protocol.scan(&spending, &viewing, overrides).await;
    pb.finish_and_clear();
    let report = report.context("Scan failed")?;

    println!(
        "   {} {} scanned, {} skipped, source {:?}, {} ms",
        "Stats:".dimmed(),
        report.stats.scanned,
        report.stats.skipped,
        report.stats.source,
        report.stats.duration_ms
    );

    if report.announcements.is_empty() {
        println!("\n{}", "No payments found.".yellow());
        return Ok(());
    }

    println!("\n{} {} payment(s) found:", "✅".green(), report.announcements.len());
    for found in &report.announcements {
        let status = if found.is_withdrawn {
            "withdrawn".dimmed()
        } else {
            "available".green()
        };
        println!("   {} {} [{}]", "Address:".green(), found.receiver().to_checksum(None), status);
        println!("      Amount {} of token {}", found.announcement.amount, found.announcement.token);
        println!("      Block {} tx {}", found.block_number, found.tx_hash);
    }

    Ok(())
}

/// Withdraw funds held at a stealth address
async fn cmd_withdraw(
    private_key: &str,
    destination: &str,
    token: Option<&str>,
    gas_price: Option<&str>,
    args: &ChainArgs,
) -> Result<()> {
    let stealth = KeyPair::from_private_key(private_key).context("Invalid stealth private key")?;
    let destination = parse_address(destination).context("Invalid destination address")?;
    let token = parse_token(token)?;
    let options = WithdrawOptions {
        gas_price: gas_price.map(parse_amount).transpose()?,
        ..WithdrawOptions::default()
    };

    println!(
        "{} {}",
        "🏧 Withdrawing from:".cyan().bold(),
        stealth.checksum_address()
    );

    let protocol = connect(args, None, Denylist::default())?;
    let tx = protocol
        .withdraw(&stealth, token, destination, options)
        .await
        .context("Withdrawal failed")?;

    println!("\n{}", "✅ Withdrawal submitted:".green().bold());
    println!("   {} {}", "Transaction:".yellow(), tx.hash);
    println!("   {} {}", "Value:".dimmed(), tx.value);

    Ok(())
}

/// Sign a relayed withdrawal
#[allow(clippy::too_many_arguments)]
fn cmd_sign_withdraw(
    chain: &ChainConfig,
    private_key: &str,
    acceptor: &str,
    token: &str,
    sponsor: &str,
    fee: &str,
    hook: Option<&str>,
    hook_data: Option<&str>,
) -> Result<()> {
    let stealth = KeyPair::from_private_key(private_key).context("Invalid stealth private key")?;
    let hook = match hook {
        Some(hook) => {
            let data = match hook_data {
                Some(data) => parse_hook_data(data)?,
                None => Bytes::new(),
            };
            Some((parse_address(hook).context("Invalid hook address")?, data))
        }
        None => None,
    };
    if hook.as_ref().is_some_and(|(address, _)| address.is_zero()) {
        bail!("Hook address must not be zero");
    }

    let mut authorization = WithdrawAuthorization::new(
        chain.chain_id,
        chain.contract_address,
        parse_address(acceptor).context("Invalid acceptor address")?,
        parse_address(token).context("Invalid token address")?,
        parse_address(sponsor).context("Invalid sponsor address")?,
        parse_amount(fee)?,
    );
    if let Some((hook, data)) = hook {
        authorization = authorization.with_hook(hook, data);
    }

    let signed = SignedWithdrawal::sign(&stealth, &authorization)?;
    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(())
}

/// Relay a withdrawal signed by a stealth address holder
async fn cmd_relay(file: &Path, from: &str, args: &ChainArgs) -> Result<()> {
    let signed: SignedWithdrawal = serde_json::from_reader(
        std::fs::File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    )
    .context("Malformed signed withdrawal")?;
    let relayer = parse_address(from).context("Invalid relayer address")?;

    println!(
        "{} {}",
        "📨 Relaying withdrawal for:".cyan().bold(),
        signed.stealth_address
    );

    let protocol = connect(args, None, Denylist::default())?;
    let tx = relay(&protocol, &signed, relayer).await?;

    println!("\n{}", "✅ Relayed withdrawal submitted:".green().bold());
    println!("   {} {}", "Transaction:".yellow(), tx.hash);
    Ok(())
}

/// List known deployments
fn cmd_chains(chains_file: Option<&Path>) -> Result<()> {
    let mut registry = ChainRegistry::with_defaults();
    if let Some(path) = chains_file {
        let added = registry
            .load_file(path)
            .with_context(|| format!("Failed to load chain records from {}", path.display()))?;
        println!("{} {} custom record(s)", "📂 Loaded".cyan(), added);
    }

    println!("\n{}", "Known deployments:".yellow().bold());
    for chain in registry.iter() {
        println!(
            "   {:>10}  {}  from block {}{}",
            chain.chain_id,
            chain.contract_address.to_checksum(None),
            chain.start_block,
            chain
                .indexer_endpoint
                .as_deref()
                .map(|endpoint| format!("  indexer {endpoint}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
