use anyhow::{bail, Context, Result};
use brew_config::secrets::resolve_secrets;
use brew_daemon::{bootstrap, intake};
use brew_nlu::QueryInput;
use brew_schemas::{format_micros, parse_decimal_micros};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "brew")]
#[command(about = "Coffee order service operator CLI", long_about = None)]
struct Cli {
    /// Debug-level logging on stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Account provisioning and inspection (Postgres backend)
    Account {
        #[command(subcommand)]
        cmd: AccountCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run one utterance through NLU and the order workflow
    Order {
        /// Utterance text, e.g. "two espressos for emp1"
        #[arg(long)]
        text: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Retry-safe key; reusing it replays the first order
        #[arg(long)]
        idempotency_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,

    /// List idempotency claims with no order attached (reconciliation aid).
    StaleClaims {
        /// Only claims older than this many seconds
        #[arg(long, default_value_t = 300)]
        older_than_secs: i64,
    },
}

#[derive(Subcommand)]
enum AccountCmd {
    /// Create an account or reset its balance
    Open {
        #[arg(long)]
        id: String,

        /// Decimal amount, e.g. 10.00
        #[arg(long)]
        balance: String,
    },

    /// Print balance
    Show {
        #[arg(long)]
        id: String,
    },

    /// List orders for an account, oldest first
    Orders {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = brew_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = brew_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate => {
                    brew_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::StaleClaims { older_than_secs } => {
                    let claims = brew_db::stale_open_claims(&pool, older_than_secs).await?;
                    for (key, claimed_at) in &claims {
                        println!("idempotency_key={} claimed_at_utc={}", key, claimed_at.to_rfc3339());
                    }
                    println!("stale_claims={}", claims.len());
                }
            }
        }

        Commands::Account { cmd } => {
            let pool = brew_db::connect_from_env().await?;
            match cmd {
                AccountCmd::Open { id, balance } => {
                    let micros = parse_decimal_micros(&balance)
                        .with_context(|| format!("invalid --balance '{balance}'"))?;
                    brew_db::open_account(&pool, &id, micros).await?;
                    println!("account_id={} balance={}", id, format_micros(micros));
                }
                AccountCmd::Show { id } => match brew_db::fetch_account(&pool, &id).await? {
                    Some(a) => println!(
                        "account_id={} balance={}",
                        a.account_id,
                        format_micros(a.balance_micros)
                    ),
                    None => bail!("account not found: {id}"),
                },
                AccountCmd::Orders { id } => {
                    let orders = brew_db::fetch_orders_for_account(&pool, &id).await?;
                    for o in &orders {
                        println!(
                            "order_id={} product_id={} quantity={} amount={} created_at_utc={}",
                            o.order_id,
                            o.product_id,
                            o.quantity,
                            format_micros(o.amount_micros),
                            o.created_at_utc.to_rfc3339()
                        );
                    }
                    println!("orders={}", orders.len());
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = brew_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Order {
            text,
            config_paths,
            idempotency_key,
        } => {
            let (_loaded, cfg) = bootstrap::load_config(&config_paths)?;
            let secrets = resolve_secrets(&cfg)?;
            let services = bootstrap::build_services(&cfg, &secrets).await?;

            let outcome = intake::process_utterance(
                services.nlu.as_ref(),
                &services.workflow,
                QueryInput::Text(text),
                idempotency_key.as_deref(),
            )
            .await;
            services.nlu.shutdown().await;

            match outcome {
                Ok(intake::IntakeOutcome::Relay(reply)) => println!("{reply}"),
                Ok(intake::IntakeOutcome::Placed(done)) => {
                    println!("{}", done.message);
                    println!(
                        "order_id={} amount={} replayed={}",
                        done.order.order_id,
                        format_micros(done.order.amount_micros),
                        done.replayed
                    );
                }
                Err(e) => bail!("Error processing order: {e}"),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .init();
}
