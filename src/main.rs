use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use check_my_plants::actions;
use check_my_plants::config::{Cli, Command, Settings};
use check_my_plants::db::Database;
use check_my_plants::filters::AppState;
use check_my_plants::images::ImageStore;
use check_my_plants::pages::Pages;
use check_my_plants::token::TokenService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,check_my_plants=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    let db = Database::connect(&settings.database_url, settings.pool_size)
        .with_context(|| format!("failed to open database {}", settings.database_url))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, db).await,
        Command::Migrate => {
            db.migrate()?;
            tracing::info!("database is up to date");
            Ok(())
        }
        Command::CreateSuperuser { email, password } => {
            db.migrate()?;
            let hasher = settings.hasher();
            let user = db
                .run(move |conn| {
                    let hashed = hasher.hash(&password)?;
                    Ok(actions::upsert_superuser(conn, &email, &hashed)?)
                })
                .await?;
            tracing::info!(user = %user.id, email = %user.email, "superuser ready");
            Ok(())
        }
    }
}

async fn serve(settings: Settings, db: Database) -> anyhow::Result<()> {
    let secret = settings
        .secret
        .as_deref()
        .context("SECRET must be set to sign access tokens")?;

    db.migrate()?;
    tokio::fs::create_dir_all(&settings.static_dir)
        .await
        .with_context(|| format!("failed to create {}", settings.static_dir.display()))?;

    let state = AppState {
        db,
        tokens: TokenService::new(secret.as_bytes(), settings.algorithm, settings.token_lifetime()),
        hasher: settings.hasher(),
        images: ImageStore::new(&settings.static_dir),
        pages: Arc::new(Pages::new()?),
    };

    let (addr, server) = warp::serve(check_my_plants::routes(state))
        .try_bind_with_graceful_shutdown(settings.bind_addr, async {
            tokio::signal::ctrl_c().await.ok();
        })
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!(%addr, "listening");
    server.await;
    tracing::info!("shut down");
    Ok(())
}
