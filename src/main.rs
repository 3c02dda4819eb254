use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use paygate::config::{CONFIG_ENV, GatewayConfig};
use paygate::domain::ports::{HttpTransportRef, TransactionStore, TransactionStoreRef};
use paygate::infrastructure::http::ReqwestTransport;
use paygate::infrastructure::in_memory::InMemoryTransactionStore;
#[cfg(feature = "storage-rocksdb")]
use paygate::infrastructure::rocksdb::RocksDBStore;
use paygate::interfaces::csv::transaction_writer::TransactionWriter;
use paygate::{CallbackRequest, Gateway, Resolver};
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "paygate", author, version, about, long_about = None)]
struct Cli {
    /// Gateway configuration file (JSON). Falls back to $PAYGATE_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Repeat for more log output (-v, -vv). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the supported gateways.
    Gateways,

    /// Create a payment request and print the redirect URL.
    Request {
        /// Gateway name, case-insensitive.
        #[arg(long)]
        gateway: String,

        #[arg(long)]
        amount: Decimal,

        /// Overrides the configured callback URL.
        #[arg(long)]
        callback: Option<Url>,

        #[arg(long)]
        description: Option<String>,

        /// Restrict payment to this card.
        #[arg(long)]
        card: Option<String>,

        /// Payer IP address, stored with the transaction.
        #[arg(long)]
        ip: Option<String>,
    },

    /// Verify a callback given its query string.
    Verify {
        /// e.g. "transaction_id=1&success=1&refId=abc"
        query: String,
    },

    /// Print every stored transaction as CSV.
    Transactions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Gateways = cli.command {
        for gateway in Gateway::ALL {
            println!("{gateway}");
        }
        return Ok(());
    }

    let config = Arc::new(load_config(cli.config)?);
    let store = open_store(cli.db_path)?;

    match cli.command {
        Command::Gateways => {}
        Command::Request {
            gateway,
            amount,
            callback,
            description,
            card,
            ip,
        } => {
            let mut resolver = Resolver::new(config.clone(), store, transport(&config)?);
            let port = resolver.make(gateway).into_diagnostic()?;
            port.set(amount).into_diagnostic()?;
            if let Some(callback) = callback {
                port.set_callback(callback);
            }
            if let Some(description) = description {
                port.set_description(description);
            }
            if let Some(card) = card {
                port.set_valid_card_number(card);
            }
            if let Some(ip) = ip {
                port.set_ip(ip);
            }
            port.ready().await.into_diagnostic()?;
            let target = port.redirect().into_diagnostic()?;

            if let Some(id) = port.transaction_id() {
                println!("transaction_id={id}");
            }
            println!("redirect={}", target.as_str());
        }
        Command::Verify { query } => {
            let mut resolver = Resolver::new(config.clone(), store, transport(&config)?);
            let request = CallbackRequest::from_query(&query);
            let tx = resolver.verify(&request).await.into_diagnostic()?;

            println!("transaction_id={}", tx.id);
            println!("status={}", tx.status);
            if let Some(tracking_code) = &tx.tracking_code {
                println!("tracking_code={tracking_code}");
            }
            if let Some(card_number) = &tx.card_number {
                println!("card_number={card_number}");
            }
        }
        Command::Transactions => {
            let timezone = config.timezone().into_diagnostic()?;
            let transactions = store.all().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = TransactionWriter::new(stdout.lock(), timezone);
            writer.write_transactions(transactions).into_diagnostic()?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<GatewayConfig> {
    match path {
        Some(path) => GatewayConfig::from_file(path).into_diagnostic(),
        None if std::env::var_os(CONFIG_ENV).is_some() => {
            GatewayConfig::from_env().into_diagnostic()
        }
        None => {
            tracing::debug!("no configuration given, using defaults");
            Ok(GatewayConfig::default())
        }
    }
}

fn open_store(db_path: Option<PathBuf>) -> Result<TransactionStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryTransactionStore::new()))
        }
        None => Ok(Arc::new(InMemoryTransactionStore::new())),
    }
}

fn transport(config: &GatewayConfig) -> Result<HttpTransportRef> {
    let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs)).into_diagnostic()?;
    Ok(Arc::new(transport))
}
