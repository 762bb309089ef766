// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mnemos - a single-user conversational agent with long-term memory.
//!
//! Binary entry point. `mnemos shell` runs an interactive session; the
//! chat-transport adapters (Telegram and friends) connect through the
//! same orchestrator surface out of tree.

mod shell;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemos_config::Config;

/// Mnemos - a conversational agent with three-tier long-term memory.
#[derive(Parser, Debug)]
#[command(name = "mnemos", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an interactive shell session against the full agent.
    Shell,
    /// Print the resolved configuration and state paths.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(2);
        }
    };

    init_tracing(&config);

    let result = match cli.command {
        Commands::Shell => shell::run(&config).await,
        Commands::Config => {
            println!("profile:  {}", config.profile);
            println!("state:    {}", config.state_dir().display());
            println!("database: {}", config.db_path().display());
            println!("chat model: {} (tool model: {})", config.chat_model, config.tool_model);
            println!(
                "embeddings: {} (dimension {})",
                config.embedding_model, config.embedding_dimension
            );
            println!("timezone: {}", config.timezone);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, kind = e.kind(), "fatal");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    let default_level = if config.debug_show_full_prompt || config.debug_log_database_ops {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mnemos={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
