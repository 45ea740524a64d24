//! creatoros-messages - CreatorOS message history from the command line
//!
//! Reads and writes the same local history the app uses, mirroring new
//! messages to the record store when one is configured.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creatoros_messages::api::RecordStoreClient;
use creatoros_messages::config::Config;
use creatoros_messages::storage::FileStore;
use creatoros_messages::sync::RemoteSync;
use creatoros_messages::{
    MessageDirection, MessageLibrary, MessageRecord, MessageSource, NewMessage, ParticipantRole,
};

#[derive(Parser)]
#[command(name = "creatoros-messages")]
#[command(about = "CreatorOS message history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a message
    Append {
        /// Name of the other party
        #[arg(short, long)]
        name: String,

        /// Role of the other party: creator, mentor, sponsor
        #[arg(short, long)]
        role: Option<ParticipantRole>,

        /// sent or received
        #[arg(short, long)]
        direction: Option<MessageDirection>,

        /// Provenance tag (creator-network, library, ...)
        #[arg(short, long)]
        source: Option<MessageSource>,

        /// Message content
        content: String,
    },

    /// Show message history
    List {
        /// Only show messages with this participant
        #[arg(short, long)]
        participant: Option<String>,

        /// Only show messages with participants in this role
        #[arg(short, long)]
        role: Option<ParticipantRole>,

        /// Maximum number of messages to show (most recent)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List everyone with message history
    Participants,

    /// Delete all messages for a participant
    Remove {
        /// Participant name (exact match)
        name: String,

        /// Only delete messages where the participant has this role
        #[arg(short, long)]
        role: Option<ParticipantRole>,
    },

    /// Show storage and sync status
    Status,

    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load()?;

    let library = open_library(&config)?;

    match cli.command {
        Commands::Append {
            name,
            role,
            direction,
            source,
            content,
        } => {
            let mut input = NewMessage::new(name, content);
            input.participant_role = role;
            input.direction = direction;
            input.source = source;

            let record = match library.append(input) {
                Ok(record) => record,
                Err(e) => bail!("Message not recorded: {}", e),
            };
            tracing::info!("Recorded message {}", record.id);
            print_record(&record);
        }
        Commands::List {
            participant,
            role,
            limit,
        } => {
            let records: Vec<MessageRecord> = match participant {
                Some(name) => library.messages_for_participant(&name, role),
                None => library
                    .messages()
                    .into_iter()
                    .filter(|r| role.map_or(true, |role| r.participant_role == role))
                    .collect(),
            };

            if records.is_empty() {
                println!("(no messages)");
            }
            let skip = records.len().saturating_sub(limit);
            for record in &records[skip..] {
                print_record(record);
            }
        }
        Commands::Participants => {
            let participants = library.participant_counts();
            if participants.is_empty() {
                println!("(no participants)");
            }
            for (name, role, count) in participants {
                println!("{} ({}) - {} message(s)", name, role, count);
            }
        }
        Commands::Remove { name, role } => {
            let removed = library.remove_for_participant(&name, role);
            println!("Removed {} message(s) for {}", removed, name);
        }
        Commands::Status => {
            println!("\nMessage Library:");
            println!("  Config: {}", Config::config_path()?.display());
            println!("  Storage: {}", config.storage_dir()?.display());
            println!("  Messages: {}", library.len());
            match config.max_records() {
                Some(max) => println!("  Retention: {} messages", max),
                None => println!("  Retention: unbounded"),
            }
            match config.remote() {
                Some(remote) => println!("  Remote: {} (table {})", remote.url, remote.table()),
                None => println!("  Remote: not configured"),
            }
        }
        Commands::InitConfig => {
            config.save()?;
            println!("Config written to {}", Config::config_path()?.display());
        }
    }

    library.shutdown().await;
    Ok(())
}

/// Wire storage and the optional mirror from configuration.
fn open_library(config: &Config) -> Result<MessageLibrary> {
    let storage = Arc::new(FileStore::new(config.storage_dir()?));

    let sync = match config.remote() {
        Some(remote) => {
            let client = Arc::new(RecordStoreClient::from_config(remote));
            RemoteSync::start(client, remote.table())
        }
        None => {
            tracing::warn!(
                "Record store URL or anon key is not set. Set CREATOROS_SUPABASE_URL and CREATOROS_SUPABASE_ANON_KEY."
            );
            RemoteSync::disabled()
        }
    };

    Ok(MessageLibrary::with_sync(storage, sync).with_max_records(config.max_records()))
}

fn print_record(record: &MessageRecord) {
    let arrow = match record.direction {
        MessageDirection::Sent => "->",
        MessageDirection::Received => "<-",
    };
    println!(
        "[{}] {} {} ({}, {}): {}",
        record.created_at,
        arrow,
        record.participant_name,
        record.participant_role,
        record.source,
        record.content
    );
}
