use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use spotify_lyrics_translator::app::{self, App};
use spotify_lyrics_translator::config::{
    default_credentials_path, Config, Credentials, SP_DC_ENV,
};
use spotify_lyrics_translator::spotify::SpotifyClient;

#[derive(Debug, Parser)]
#[command(
    name = "spotify-lyrics-translator",
    version,
    about = "Synchronized Spotify lyrics with line-by-line translation"
)]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spotify `sp_dc` cookie for this run (overrides env and saved credentials).
    #[arg(long)]
    sp_dc: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow playback and show translated lyrics (default).
    Run,
    /// Verify and save a Spotify `sp_dc` cookie.
    Login { token: String },
    /// Show translation cache statistics.
    CacheInfo,
    /// Remove every cached translation.
    ClearCache,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_login_help(reason: &str) {
    eprintln!("{}", reason);
    eprintln!();
    eprintln!("1. Open https://open.spotify.com in a browser and log in.");
    eprintln!("2. Copy the value of the `sp_dc` cookie.");
    eprintln!("3. Run: spotify-lyrics-translator login <sp_dc>");
    eprintln!();
    eprintln!(
        "You can also pass --sp-dc <value> or set the {} environment variable.",
        SP_DC_ENV
    );
}

async fn login(token: &str) -> Result<()> {
    let client = SpotifyClient::new(token.trim()).context("创建 Spotify 客户端失败")?;
    client
        .verify()
        .await
        .context("sp_dc was rejected by Spotify")?;

    let path = default_credentials_path();
    Credentials {
        sp_dc: token.trim().to_string(),
    }
    .save(&path)?;
    println!("Logged in. Credentials saved to {}", path.display());
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.clone()).context("加载配置失败")?;
    debug!("配置: {:?}", config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let credentials =
                match Credentials::resolve(cli.sp_dc.as_deref(), &default_credentials_path()) {
                    Some(credentials) => credentials,
                    None => {
                        print_login_help("No Spotify credentials found.");
                        return Ok(ExitCode::FAILURE);
                    }
                };

            let mut app = App::new(Arc::new(config), credentials);
            if let Err(e) = app.run().await {
                if app::is_auth_failure(&e) {
                    print_login_help("Spotify session expired or the sp_dc cookie was rejected.");
                    return Ok(ExitCode::FAILURE);
                }
                return Err(e);
            }
        }
        Command::Login { token } => login(&token).await?,
        Command::CacheInfo => println!("{}", app::cache_info(&config)),
        Command::ClearCache => {
            let removed = app::clear_cache(&config)?;
            println!("Removed {} cached translations", removed);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
