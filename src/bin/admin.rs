//! Habit Sync Admin CLI
//!
//! Administration tool for managing API keys in the server config file.
//!
//! # Usage
//!
//! ```bash
//! habit-sync-admin key add alice
//! habit-sync-admin key list
//! habit-sync-admin key remove alice
//! ```
//!
//! # Environment Variables
//!
//! - `HABIT_SYNC_CONFIG`: Path to config file (default: ~/.config/habit-sync/config.yaml)

use clap::{Args, Parser, Subcommand};
use habit_sync::server::issue_api_key;
use habit_sync::Config;
use std::path::{Path, PathBuf};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "habit-sync-admin")]
#[command(version)]
#[command(about = "Habit sync server administration tool")]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage API keys
    Key(KeyCommand),
}

#[derive(Args)]
struct KeyCommand {
    #[command(subcommand)]
    command: KeySubcommand,
}

#[derive(Subcommand)]
enum KeySubcommand {
    /// Issue a new API key for a user
    Add {
        /// User id the key authenticates as
        user_id: String,
    },
    /// List issued keys
    List,
    /// Revoke every key of a user
    Remove {
        /// User id whose keys are revoked
        user_id: String,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn add_key(path: &Path, user_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_file(path)?;

    if config.api_keys.iter().any(|entry| entry.user_id == user_id) {
        return Err(format!("User '{}' already has a key; remove it first", user_id).into());
    }

    let entry = issue_api_key(&user_id)?;
    let key = entry.key.clone();
    config.api_keys.push(entry);
    config.save(path)?;

    println!("Added key for user: {}", user_id);
    println!("  Key: {}", key);
    println!();
    println!("Restart the server to pick up the new key.");

    Ok(())
}

fn list_keys(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_file(path)?;

    if config.api_keys.is_empty() {
        println!("No API keys issued.");
        return Ok(());
    }

    println!("{:<40} {:<12}", "USER", "KEY");
    println!("{}", "-".repeat(52));

    for entry in &config.api_keys {
        let prefix: String = entry.key.chars().take(8).collect();
        println!("{:<40} {}...", entry.user_id, prefix);
    }

    println!();
    println!("Total: {} key(s)", config.api_keys.len());

    Ok(())
}

fn remove_key(path: &Path, user_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_file(path)?;

    let before = config.api_keys.len();
    config.api_keys.retain(|entry| entry.user_id != user_id);
    if config.api_keys.len() == before {
        return Err(format!("No key found for user '{}'", user_id).into());
    }
    config.save(path)?;

    println!("Removed key(s) for user: {}", user_id);

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(Config::default_config_path);

    let result = match cli.command {
        Commands::Key(key_cmd) => match key_cmd.command {
            KeySubcommand::Add { user_id } => add_key(&path, user_id),
            KeySubcommand::List => list_keys(&path),
            KeySubcommand::Remove { user_id } => remove_key(&path, user_id),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
