use std::sync::Arc;

use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, LevelFilter, Verbosity};
use farm_keeper::config::Settings;
use farm_keeper::context::{Context, DatabasePoolSize, DatabaseUrl};
use farm_keeper::enrichment;
use farm_keeper::ledger::{CounterpartyClient, LedgerArgs};
use farm_keeper::players::{self, PlayerSort};
use farm_keeper::sync::Reconciler;
use farm_keeper::tokens::{self, TokenView};
use farm_keeper::uploads::{self, UploadSubmission, UploadView};
use farm_keeper::parse_dur;
use serde::Serialize;
use shared::player::{PlayerAddress, ProfileChanges};
use shared::token::{NewToken, TokenKind};
use tokio::signal;
use tokio::sync::oneshot;
use tokio::time;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(clap::Parser)]
pub struct CmdlineArgs {
    /// URL to a Postgres database
    #[clap(long, env)]
    pub database_url: String,
    /// Maximum number of pooled database connections
    #[clap(long, env, default_value_t = 8)]
    pub database_pool_size: usize,
    #[command(flatten)]
    pub settings: Settings,
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile players with the ledger periodically
    Sync {
        #[command(flatten)]
        ledger: LedgerArgs,
        /// Sleep duration between reconciliation passes
        #[clap(long, env, value_parser = parse_dur)]
        sleep_duration: time::Duration,
    },
    /// Manage tokens
    #[command(subcommand)]
    Tokens(TokenCommand),
    /// Submit and moderate image uploads
    #[command(subcommand)]
    Uploads(UploadCommand),
    /// Inspect and update players
    #[command(subcommand)]
    Players(PlayerCommand),
}

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Register a token
    Create {
        #[clap(long)]
        name: String,
        /// Special role of the token (access or reward)
        #[clap(long)]
        kind: Option<TokenKind>,
        #[clap(long)]
        long_name: Option<String>,
        #[clap(long)]
        issuer: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        image_url: Option<String>,
        #[clap(long)]
        thumb_url: Option<String>,
        #[clap(long, default_value_t = 0)]
        total_issued: u64,
        #[clap(long)]
        divisible: bool,
        #[clap(long)]
        locked: bool,
    },
    /// Show a token
    Show { name: String },
}

#[derive(Subcommand)]
pub enum UploadCommand {
    /// List uploads awaiting moderation
    Pending,
    /// Submit a signed image change for a player
    Submit {
        #[clap(long)]
        address: String,
        #[clap(long)]
        image_url: String,
        /// Base64 signature of the timestamp by the player's address key
        #[clap(long)]
        signature: String,
        #[clap(long)]
        timestamp: String,
    },
    /// Accept a pending upload
    Accept { id: i32 },
    /// Reject a pending upload, restoring the previous image
    Reject { id: i32 },
}

#[derive(Subcommand)]
pub enum PlayerCommand {
    /// List processed players
    List {
        #[clap(long, value_enum, default_value_t = PlayerSort::Access)]
        sort: PlayerSort,
    },
    /// Show a player with all balances
    Show { address: String },
    /// Apply a signed profile update
    Update {
        #[clap(long)]
        address: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long, allow_hyphen_values = true)]
        latitude: Option<f64>,
        #[clap(long, allow_hyphen_values = true)]
        longitude: Option<f64>,
        #[clap(long)]
        signature: String,
        #[clap(long)]
        timestamp: String,
    },
}

const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let CmdlineArgs {
        database_url,
        database_pool_size,
        settings,
        verbosity,
        command,
    } = CmdlineArgs::parse();

    let log_level = match verbosity.log_level_filter() {
        LevelFilter::Off => None,
        LevelFilter::Error => Some(Level::ERROR),
        LevelFilter::Warn => Some(Level::WARN),
        LevelFilter::Info => Some(Level::INFO),
        LevelFilter::Debug => Some(Level::DEBUG),
        LevelFilter::Trace => Some(Level::TRACE),
    };
    if let Some(log_level) = log_level {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("setting default subscriber failed")?;
    }

    tracing::info!(version = %VERSION_STRING, "Starting farm keeper");

    let context = Context::new(
        settings,
        DatabaseUrl(database_url),
        DatabasePoolSize(database_pool_size),
    )
    .await?;

    match command {
        Command::Sync {
            ledger,
            sleep_duration,
        } => run_sync(context, ledger, sleep_duration).await,
        Command::Tokens(command) => run_token_command(&context, command).await,
        Command::Uploads(command) => run_upload_command(&context, command).await,
        Command::Players(command) => run_player_command(&context, command).await,
    }
}

async fn run_sync(
    context: Context,
    ledger: LedgerArgs,
    sleep_duration: time::Duration,
) -> anyhow::Result<()> {
    let ledger = Arc::new(CounterpartyClient::new(ledger)?);
    let (queue, receiver) = enrichment::channel();
    let worker = tokio::spawn(enrichment::run_worker(
        receiver,
        context.db_connection_pool().clone(),
    ));
    let reconciler = Reconciler::new(context, ledger, queue);

    let mut interval = {
        let mut ticker = time::interval(sleep_duration);
        ticker.tick().await; // skip first tick
        ticker
    };
    let mut ctrl_c = ctrl_c_receiver();

    reconcile_players(&reconciler).await;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupt signal received, exiting");
                break;
            }
            _ = sleep(sleep_duration, &mut interval) => {
                reconcile_players(&reconciler).await;
            }
        }
    }

    drop(reconciler);
    if let Err(err) = worker.await {
        tracing::error!(reason = ?err, "Enrichment worker panicked");
    }
    Ok(())
}

async fn reconcile_players(reconciler: &Reconciler) {
    tracing::info!("Reconciling players with the ledger");
    match reconciler.run_pass().await {
        Ok(summary) => tracing::info!(
            holders = summary.holders,
            created = summary.created,
            enqueued = summary.enqueued,
            "Reconciliation pass concluded"
        ),
        Err(err) => tracing::error!(reason = ?err, "Reconciliation pass failed, retrying next tick"),
    }
}

async fn sleep(dur: time::Duration, interval: &mut time::Interval) {
    tracing::debug!(idle_duration = ?dur, "Idling");
    interval.tick().await;
}

fn ctrl_c_receiver() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Error receiving interrupt signal");
        tx.send(()).expect("Error transmitting interrupt signal");
    });
    rx
}

async fn run_token_command(context: &Context, command: TokenCommand) -> anyhow::Result<()> {
    let settings = context.shared_settings();
    match command {
        TokenCommand::Create {
            name,
            kind,
            long_name,
            issuer,
            description,
            image_url,
            thumb_url,
            total_issued,
            divisible,
            locked,
        } => {
            let new_token = NewToken {
                name,
                kind,
                long_name,
                issuer,
                description,
                image_url,
                thumb_url,
                total_issued,
                divisible,
                locked,
            };
            let token = context
                .db_connection_pool()
                .transaction(move |conn| tokens::create_token(conn, new_token))
                .await?;
            print_json(&TokenView::new(&token, &settings))
        }
        TokenCommand::Show { name } => {
            let token = context
                .db_connection_pool()
                .with(move |conn| {
                    use farm_keeper::store::TokenStore;
                    conn.token_by_name(&name)
                })
                .await??
                .context("No such token")?;
            print_json(&TokenView::new(&token, &settings))
        }
    }
}

async fn run_upload_command(context: &Context, command: UploadCommand) -> anyhow::Result<()> {
    let pool = context.db_connection_pool();
    match command {
        UploadCommand::Pending => {
            let queue = pool.with(|conn| uploads::pending(conn)).await??;
            print_json(&queue)
        }
        UploadCommand::Submit {
            address,
            image_url,
            signature,
            timestamp,
        } => {
            let settings = context.shared_settings();
            let verifier = context.verifier().clone();
            let submission = UploadSubmission {
                address: PlayerAddress(address),
                new_image_url: image_url,
                signature,
                timestamp,
            };
            let upload = pool
                .transaction(move |conn| uploads::submit(conn, &settings, &verifier, submission))
                .await?;
            print_json(&UploadView::from(upload))
        }
        UploadCommand::Accept { id } => {
            let upload = pool
                .transaction(move |conn| uploads::accept(conn, id))
                .await?;
            print_json(&UploadView::from(upload))
        }
        UploadCommand::Reject { id } => {
            let upload = pool
                .transaction(move |conn| uploads::reject(conn, id))
                .await?;
            print_json(&UploadView::from(upload))
        }
    }
}

async fn run_player_command(context: &Context, command: PlayerCommand) -> anyhow::Result<()> {
    let pool = context.db_connection_pool();
    let settings = context.shared_settings();
    match command {
        PlayerCommand::List { sort } => {
            let listing = pool
                .with(move |conn| players::list_players(conn, &settings, sort))
                .await??;
            print_json(&listing)
        }
        PlayerCommand::Show { address } => {
            let player = pool
                .with(move |conn| players::show_player(conn, &settings, &address))
                .await??
                .context("No such player")?;
            print_json(&player)
        }
        PlayerCommand::Update {
            address,
            name,
            description,
            latitude,
            longitude,
            signature,
            timestamp,
        } => {
            let verifier = context.verifier().clone();
            let changes = ProfileChanges {
                name,
                description,
                latitude,
                longitude,
            };
            let updated = pool
                .transaction(move |conn| {
                    players::update_profile(conn, &verifier, &address, changes, &signature, &timestamp)
                })
                .await?;
            let player = pool
                .with(move |conn| players::show_player(conn, &settings, &updated.address))
                .await??
                .context("Player vanished after update")?;
            print_json(&player)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
