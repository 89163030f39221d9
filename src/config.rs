use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use jsonwebtoken::Algorithm;

use crate::hashing::Hasher;
use crate::token::parse_hmac_algorithm;

/// Home plant catalog served as a JSON API and as HTML pages.
#[derive(Debug, Parser)]
#[command(name = "check_my_plants", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Apply migrations and start the HTTP server (default).
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Create the superuser account, or promote it if the email is taken.
    CreateSuperuser {
        #[arg(long, env = "SUPERUSER_EMAIL")]
        email: String,
        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite database file.
    #[arg(long, env = "DATABASE_URL", default_value = "check_my_plants.db")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 8)]
    pub pool_size: u32,

    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3030")]
    pub bind_addr: SocketAddr,

    /// Secret used to sign access tokens; required by `serve`.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    #[arg(long, env = "ALGORITHM", default_value = "HS256", value_parser = parse_hmac_algorithm)]
    pub algorithm: Algorithm,

    #[arg(long, env = "TOKEN_LIFETIME_SECS", default_value_t = 1800)]
    pub token_lifetime_secs: u64,

    #[arg(
        long,
        env = "BCRYPT_COST",
        default_value_t = bcrypt::DEFAULT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31)
    )]
    pub bcrypt_cost: u32,

    /// Directory served under `/static`; uploaded images are stored here.
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

impl Settings {
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    pub fn hasher(&self) -> Hasher {
        Hasher::new(self.bcrypt_cost)
    }
}
