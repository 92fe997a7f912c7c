use std::{net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use api::{
    functions::{FunctionInvoker, HttpFunctionClient},
    reference::ReferenceDataClient,
    schema::{AppSchema, ShopServices, build_schema},
    seed::seed_demo_shop,
    storage::{LocalObjectStorage, MemoryObjectStorage, ObjectStorage},
};
use clap::{Parser, Subcommand, ValueEnum};
use migration::{Migrator, MigratorTrait};
use platform_obs::{ObsConfig, init_tracing};
use sea_orm::{Database, DatabaseConnection};
use tokio::net::TcpListener;
use tracing::info;

mod config;
mod http;

use config::{AppConfig, StorageBackend};
use http::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "autodetail-server", version, about = "Detailing shop GraphQL backend")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run HTTP server
    Serve {
        #[arg(long, env = "BIND", default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Run migrations
    Migrate {
        #[arg(long, value_enum, default_value_t = MigrateAction::Up)]
        action: MigrateAction,
    },
    /// Seed the demo shop
    Seed,
    /// Print GraphQL SDL
    PrintSchema,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MigrateAction {
    Up,
    Down,
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.cmd {
        Cmd::PrintSchema => {
            let AppSchema(schema) = build_schema(services(&config, None).await?);
            println!("{}", schema.sdl());
        }
        Cmd::Migrate { action } => {
            let db = connect(&config).await?;
            match action {
                MigrateAction::Up => Migrator::up(&db, None).await?,
                MigrateAction::Down => Migrator::down(&db, None).await?,
                MigrateAction::Reset => Migrator::reset(&db).await?,
            }
            info!(?action, "migrations finished");
        }
        Cmd::Seed => {
            let db = connect(&config).await?;
            Migrator::up(&db, None).await?;
            let seeded = seed_demo_shop(&db).await.context("seeding demo shop")?;
            info!(business = %seeded.business.name, "demo shop seeded");
        }
        Cmd::Serve { bind } => {
            let db = Arc::new(connect(&config).await?);
            Migrator::up(db.as_ref(), None).await?;
            let services = services(&config, Some(db.clone())).await?;
            let auth = services.auth.clone();
            let AppSchema(schema) = build_schema(services);
            let files_root = match &config.storage {
                StorageBackend::Local { root, .. } => Some(root.clone()),
                StorageBackend::Memory => None,
            };
            let app = build_router(
                AppState { schema, db, auth },
                &config.cors_allowed_origins,
                files_root,
            );

            let addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address `{bind}`"))?;
            let listener = TcpListener::bind(addr).await?;
            info!("listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }
    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    Database::connect(&config.database_url)
        .await
        .context("connecting to DATABASE_URL")
}

/// Wire the collaborators. `print-schema` runs without a database.
async fn services(
    config: &AppConfig,
    db: Option<Arc<DatabaseConnection>>,
) -> anyhow::Result<ShopServices> {
    let db = match db {
        Some(db) => db,
        None => Arc::new(DatabaseConnection::Disconnected),
    };
    let storage: Arc<dyn ObjectStorage> = match &config.storage {
        StorageBackend::Local { root, public_url } => {
            prepare_storage_root(root).await?;
            Arc::new(LocalObjectStorage::new(root, public_url.clone()))
        }
        StorageBackend::Memory => {
            tracing::warn!("object storage is in memory; uploads vanish on restart");
            Arc::new(MemoryObjectStorage::default())
        }
    };
    let functions: Arc<dyn FunctionInvoker> =
        Arc::new(HttpFunctionClient::new(config.functions.clone())?);
    if config.functions.base_url.is_none() {
        tracing::warn!("FUNCTIONS_BASE_URL not set; reports will be unavailable");
    }
    let reference = Arc::new(ReferenceDataClient::new(config.reference.clone())?);
    Ok(ShopServices {
        db,
        auth: Arc::new(config.auth.clone()),
        storage,
        functions,
        reference,
    })
}

async fn prepare_storage_root(root: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(root)
        .await
        .with_context(|| format!("creating storage root {}", root.display()))
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    info!("shutdown signal received");
}
