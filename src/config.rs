use crate::models::archive::expiry_after;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::{env, path::PathBuf, time::Duration};

const ENV_PREFIX: &str = "SOUBISE";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log: LogConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub debug: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub enum CommandConfig {
    Server(ServerConfig),
    Share(ShareConfig),
    Get(GetConfig),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage_path: String,
    pub broker_path: String,
    pub active_expiry: bool,
    pub tick_expiry: Duration,
}

#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub file: PathBuf,
    pub server: String,
    pub lifetime: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct GetConfig {
    pub reference_path: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Soubise makes file sharing easy")]
pub struct Cli {
    /// Verbose logging (overrides SOUBISE_DEBUG)
    #[arg(long, global = true)]
    pub debug: bool,

    /// JSON log output (overrides SOUBISE_JSON)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Starts target server
    Server(ServerArgs),
    /// Shares specified file
    Share(ShareArgs),
    /// Gets a shared file
    Get(GetArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Host to bind to (overrides SOUBISE_SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SOUBISE_SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// `inmemory` or a local directory (overrides SOUBISE_SERVER_STORAGE_PATH)
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Lock broker selection (overrides SOUBISE_SERVER_BROKER_PATH)
    #[arg(long)]
    pub broker_path: Option<String>,

    /// Reaper tick in milliseconds (overrides SOUBISE_SERVER_TICK_EXPIRY_MS)
    #[arg(long)]
    pub tick_expiry_ms: Option<u64>,

    /// Disable the background reaper; expiry is then enforced on read only
    #[arg(long)]
    pub no_active_expiry: bool,
}

#[derive(Args, Debug, Default)]
pub struct ShareArgs {
    /// Path to file to be shared (overrides SOUBISE_SHARE_FILE_PATH)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Target server address (overrides SOUBISE_SHARE_SERVER)
    #[arg(short, long)]
    pub server: Option<String>,

    /// How long the file stays downloadable, e.g. `24h`, `90m`, `1h30m`
    /// (overrides SOUBISE_SHARE_LIFETIME)
    #[arg(short, long)]
    pub lifetime: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct GetArgs {
    /// Reference path to retrieve from, prefixed with soubise://
    /// (overrides SOUBISE_GET_REF_PATH)
    #[arg(short, long)]
    pub path: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let cli = Cli::parse();
        Self::resolve(cli, |key| env::var(key).ok())
    }

    /// Merge parsed arguments over values from `lookup`.
    pub fn resolve(cli: Cli, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |scope: &str, name: &str| lookup(&env_key(scope, name));

        let log = LogConfig {
            debug: cli.debug || parse_flag(var("", "DEBUG")),
            json: cli.json || parse_flag(var("", "JSON")),
        };

        let command = match cli.command {
            Command::Server(args) => {
                // --- Environment fallback ---
                let env_port = match var("SERVER", "PORT") {
                    Some(value) => value
                        .parse::<u16>()
                        .with_context(|| format!("parsing SOUBISE_SERVER_PORT value `{}`", value))?,
                    None => 8080,
                };
                let env_tick = match var("SERVER", "TICK_EXPIRY_MS") {
                    Some(value) => value.parse::<u64>().with_context(|| {
                        format!("parsing SOUBISE_SERVER_TICK_EXPIRY_MS value `{}`", value)
                    })?,
                    None => 1000,
                };
                let tick_ms = args.tick_expiry_ms.unwrap_or(env_tick);
                if tick_ms == 0 {
                    bail!("expiry tick must be at least 1ms");
                }

                // --- Merge ---
                CommandConfig::Server(ServerConfig {
                    host: args
                        .host
                        .or_else(|| var("SERVER", "HOST"))
                        .unwrap_or_else(|| "0.0.0.0".into()),
                    port: args.port.unwrap_or(env_port),
                    storage_path: args
                        .storage_path
                        .or_else(|| var("SERVER", "STORAGE_PATH"))
                        .unwrap_or_else(|| "inmemory".into()),
                    broker_path: args
                        .broker_path
                        .or_else(|| var("SERVER", "BROKER_PATH"))
                        .unwrap_or_default(),
                    active_expiry: !args.no_active_expiry,
                    tick_expiry: Duration::from_millis(tick_ms),
                })
            }
            Command::Share(args) => {
                let file = args
                    .file
                    .or_else(|| var("SHARE", "FILE_PATH").map(PathBuf::from))
                    .context("no filepath specified -- what are you trying to share?")?;
                let lifetime = args
                    .lifetime
                    .or_else(|| var("SHARE", "LIFETIME"))
                    .unwrap_or_else(|| "24h".into());
                CommandConfig::Share(ShareConfig {
                    file,
                    server: args
                        .server
                        .or_else(|| var("SHARE", "SERVER"))
                        .unwrap_or_else(|| "http://127.0.0.1:8080".into()),
                    lifetime: parse_lifetime(&lifetime)
                        .with_context(|| format!("unable to understand lifetime `{lifetime}`"))?,
                })
            }
            Command::Get(args) => CommandConfig::Get(GetConfig {
                reference_path: args
                    .path
                    .or_else(|| var("GET", "REF_PATH"))
                    .context("no reference path specified -- what are you trying to get?")?,
            }),
        };

        Ok(Self { log, command })
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_key(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        format!("{ENV_PREFIX}_{name}")
    } else {
        format!("{ENV_PREFIX}_{scope}_{name}")
    }
}

fn parse_flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Parse lifetimes written as `<number><unit>` groups, units `s`, `m`,
/// `h` and `d`, e.g. `45s`, `24h`, `1h30m`.
pub fn parse_lifetime(input: &str) -> Result<chrono::Duration> {
    let mut total = chrono::Duration::zero();
    let mut digits = String::new();
    for c in input.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            bail!("expected a number before `{c}`");
        }
        let amount: i64 = digits.parse().context("lifetime amount is too large")?;
        let part = match c {
            's' => chrono::Duration::try_seconds(amount),
            'm' => chrono::Duration::try_minutes(amount),
            'h' => chrono::Duration::try_hours(amount),
            'd' => chrono::Duration::try_days(amount),
            other => bail!("unknown unit `{other}`"),
        }
        .context("lifetime is out of range")?;
        total = total
            .checked_add(&part)
            .context("lifetime is out of range")?;
        digits.clear();
    }
    if !digits.is_empty() {
        bail!("missing unit after `{digits}`");
    }
    if total <= chrono::Duration::zero() {
        bail!("lifetime must be positive");
    }
    expiry_after(Utc::now(), total)?;
    Ok(total)
}
