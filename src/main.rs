//! Gameroom server CLI - hosts room-based multiplayer sessions.
//!
//! This is the main binary entry point. See the `gameroom` library
//! for the core functionality.

use anyhow::Result;
use gameroom::{Config, Server};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
use clap::{Parser, Subcommand};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Global flag for signal-triggered shutdown (as Arc for signal-hook compatibility)
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Run the server until a shutdown signal flips the flag.
fn run_server(config: &Config) -> Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    flag::register(SIGINT, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGTERM, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGHUP, Arc::clone(&SHUTDOWN_FLAG))?;

    let mut server = Server::bind(config.socket_addr())?;
    println!("Listening on {}", server.local_addr());
    log::info!("Gameroom v{} started", env!("CARGO_PKG_VERSION"));

    server.run(&SHUTDOWN_FLAG);

    println!("Shutting down...");
    server.shutdown();

    Ok(())
}

// CLI
#[derive(Parser)]
#[command(name = "gameroom")]
#[command(version)]
#[command(about = "Room-based multiplayer session server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the session server
    Serve {
        /// Bind address override
        #[arg(long)]
        bind: Option<String>,
        /// TCP port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let mut config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.clone()),
    )
    .format_timestamp_secs()
    .init();

    // Log panics before handing off to the default handler
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {:?}", panic_info);
        default_hook(panic_info);
    }));

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_server(&config)?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
