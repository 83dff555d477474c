use std::net::SocketAddr;
use std::path::Path;

use clap::Parser;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use backbeat_core::cli::{self, Cli, Commands, DbCommands, OrderCommands};
use backbeat_core::config::Config;
use backbeat_core::services::sweep;
use backbeat_core::verify::{PaystackClient, SolanaRpcClient};
use backbeat_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_args = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli_args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Sweep => {
            let pool = db::create_pool(&config).await?;
            let rpc = SolanaRpcClient::new(config.solana_rpc_url.clone());
            let report = sweep::sweep_once(
                &pool,
                &rpc,
                config.sweep_stuck_after_secs,
                config.sweep_batch_size,
            )
            .await?;
            println!(
                "Sweep finished: {} scanned, {} fulfilled, {} rejected on-chain, {} still pending, {} errors",
                report.scanned,
                report.fulfilled,
                report.rejected_on_chain,
                report.still_pending,
                report.errors
            );
            Ok(())
        }
        Commands::Order(OrderCommands::ForceFulfill { order_id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_order_force_fulfill(&pool, order_id).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    // Payment rail clients
    let paystack = PaystackClient::new(
        config.paystack_base_url.clone(),
        config.paystack_secret_key.clone(),
    );
    let solana = SolanaRpcClient::new(config.solana_rpc_url.clone());
    tracing::info!(
        "Solana RPC client initialized with URL: {}",
        config.solana_rpc_url
    );

    // Backstop trigger: re-verifies orders stuck mid-payment even when the
    // client callback and the provider webhook are both lost.
    tokio::spawn(sweep::run_sweeper(
        pool.clone(),
        solana.clone(),
        config.sweep_interval_secs,
        config.sweep_stuck_after_secs,
        config.sweep_batch_size,
    ));

    let state = AppState {
        db: pool,
        paystack,
        solana,
        config: config.clone(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
