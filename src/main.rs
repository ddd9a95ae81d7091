use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use podshelf::config::Config;
use podshelf::model::SortMode;
use podshelf::remote::RemoteClient;
use podshelf::store::Store;

/// Get the config directory path (~/.config/podshelf/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("podshelf");
    Ok(config_dir)
}

/// Create the config directory if needed and restrict it to the current
/// user, since the config file may hold an API key.
fn ensure_config_dir(config_dir: &PathBuf) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "podshelf",
    about = "Podcast browser state tool: cached catalog and per-user preferences"
)]
struct Args {
    /// Path to the config file (defaults to ~/.config/podshelf/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the podcast catalog
    Catalog {
        /// Sort order: recent, oldest, alphabetic (a-z), revAlphabetic (z-a)
        #[arg(long)]
        sort: Option<SortMode>,

        /// Refresh even if a fetch is already in flight
        #[arg(long)]
        forced: bool,
    },

    /// Read or update per-user preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    /// Show the stored preference record
    Show {
        #[arg(long)]
        email: Option<String>,
    },

    /// Replace the liked set with the given show ids (no ids clears it)
    Liked {
        #[arg(long)]
        email: Option<String>,

        /// Show ids
        ids: Vec<String>,
    },

    /// Record the last show listened to
    Last {
        #[arg(long)]
        email: Option<String>,

        /// Show id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Resolve the config file, creating the default directory on first run
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            let config_dir = get_config_dir()?;
            ensure_config_dir(&config_dir)?;
            config_dir.join("config.toml")
        }
    };

    let config = Config::load(&config_path).context("Failed to load configuration")?;
    let remote = build_remote(&config)?;
    let store = Store::with_initial_sort(remote.clone(), config.default_sort);

    match args.command {
        Command::Catalog { sort, forced } => run_catalog(&store, sort, forced).await,
        Command::Prefs(prefs) => {
            if !remote.has_user_data() {
                eprintln!("Error: No user data backend configured.");
                eprintln!();
                eprintln!(
                    "Set `user_data_url` in {} to enable preference commands.",
                    config_path.display()
                );
                std::process::exit(1);
            }
            let email = match &prefs {
                PrefsCommand::Show { email }
                | PrefsCommand::Liked { email, .. }
                | PrefsCommand::Last { email, .. } => email.clone().or_else(|| config.email.clone()),
            };
            let Some(email) = email else {
                eprintln!("Error: No email specified.");
                eprintln!();
                eprintln!(
                    "Pass --email <ADDRESS> or set `email` in {}.",
                    config_path.display()
                );
                std::process::exit(1);
            };
            run_prefs(&store, prefs, &email).await
        }
    }
}

fn build_remote(config: &Config) -> Result<RemoteClient> {
    let mut remote = RemoteClient::new(&config.catalog_url, config.request_timeout())
        .context("Invalid catalog URL in configuration")?;
    if let Some(url) = &config.user_data_url {
        remote = remote
            .with_user_data(url, config.resolved_api_key())
            .context("Invalid user data URL in configuration")?;
    }
    Ok(remote)
}

async fn run_catalog(store: &Store, sort: Option<SortMode>, forced: bool) -> Result<()> {
    if let Some(mode) = sort {
        store.set_sort_mode(mode).await;
    }

    if forced {
        store.fetch_catalog_forced().await;
    } else {
        store.fetch_catalog().await;
    }

    let snapshot = store.catalog().await;
    if let Some(error) = &snapshot.fetch.error {
        eprintln!("Error: Failed to fetch catalog: {error}");
        std::process::exit(1);
    }

    let view = store.sorted_view().await;
    println!("{} shows (sorted by {})", view.len(), snapshot.sort_mode);
    for podcast in view.iter() {
        println!(
            "{:>8}  {:<44}  {:>2} seasons  updated {}",
            podcast.id,
            podcast.title,
            podcast.seasons,
            podcast.updated.format("%Y-%m-%d")
        );
    }
    Ok(())
}

async fn run_prefs(store: &Store, command: PrefsCommand, email: &str) -> Result<()> {
    match command {
        PrefsCommand::Show { .. } => {
            store.fetch_preference(email).await;
            let snapshot = store.user_data().await;
            if let Some(error) = &snapshot.fetch.error {
                eprintln!("Error: {error}");
                std::process::exit(1);
            }
            print_record(&snapshot.record)?;
        }
        PrefsCommand::Liked { ids, .. } => {
            store.replace_liked(email, ids.into_iter().collect()).await;
            let snapshot = store.user_data().await;
            if let Some(error) = &snapshot.replace_liked.error {
                eprintln!("Error: Failed to update liked shows: {error}");
                std::process::exit(1);
            }
            println!("Liked shows updated.");
            print_record(&snapshot.record)?;
        }
        PrefsCommand::Last { id, .. } => {
            store.replace_last_listen(email, &id).await;
            let snapshot = store.user_data().await;
            if let Some(error) = &snapshot.replace_last_listen.error {
                eprintln!("Error: Failed to record last listen: {error}");
                std::process::exit(1);
            }
            println!("Last listen recorded.");
            print_record(&snapshot.record)?;
        }
    }
    Ok(())
}

fn print_record(record: &Option<podshelf::model::UserPreference>) -> Result<()> {
    match record {
        Some(record) => {
            let json = serde_json::to_string_pretty(record)
                .context("Failed to render preference record")?;
            println!("{json}");
        }
        None => println!("No preference record."),
    }
    Ok(())
}
