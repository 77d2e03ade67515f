//! notekeep - a command-line client for the notes service.
//!
//! Thin frontend over `notekeep-core`: every subcommand maps onto one
//! API client call and prints the result. Token handling lives entirely
//! in the core's session manager.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notekeep_core::auth::FileTokenStore;
use notekeep_core::models::{RegisterRequest, UploadFile};
use notekeep_core::{ApiClient, Config, SessionManager};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "notekeep", about = "Client for the notekeep notes service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that both backend services are reachable
    Health,
    /// Log in and store the session tokens
    Login {
        /// Username; defaults to the last one used
        username: Option<String>,
    },
    /// Register a new account and log in
    Register {
        username: String,
        email: String,
        /// Optional avatar URL stored in the profile
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Log out and discard the session tokens
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Work with notes
    #[command(subcommand)]
    Notes(NotesCommand),
}

#[derive(Subcommand)]
enum NotesCommand {
    /// List all notes
    List,
    /// Show one note with its attachments
    Get { id: i64 },
    /// Create a note, optionally attaching media files
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// Media file to attach; may be repeated
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Delete a note
    Delete { id: i64 },
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;

    let store = FileTokenStore::new(config.data_dir()?);
    let session = Arc::new(SessionManager::new(config.base_url.clone(), Box::new(store))?);
    let client = ApiClient::new(session);

    match cli.command {
        Command::Health => {
            report_health("notes service", client.health_check_notes().await);
            report_health("users service", client.health_check_users().await);
        }
        Command::Login { username } => {
            let username = match username.or_else(|| config.last_username.clone()) {
                Some(name) => name,
                None => anyhow::bail!("No username given and none remembered; run `notekeep login <username>`"),
            };
            let password = rpassword::prompt_password(format!("Password for {username}: "))?;
            client.login(&username, &password).await?;
            config.last_username = Some(username.clone());
            config.save().context("Failed to save configuration")?;
            println!("Logged in as {username}");
        }
        Command::Register {
            username,
            email,
            avatar_url,
        } => {
            let password = rpassword::prompt_password("Choose a password: ")?;
            let request = RegisterRequest {
                username: username.clone(),
                email,
                password,
                profile: avatar_url.map(|url| serde_json::json!({ "avatar_url": url })),
            };
            client.register(&request).await?;
            config.last_username = Some(username.clone());
            config.save().context("Failed to save configuration")?;
            println!("Registered and logged in as {username}");
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = client.self_info().await?;
            println!("{} (id {})", user.username, user.id);
            if let Some(email) = user.email {
                println!("  email: {email}");
            }
            if let Some(role) = user.role {
                println!("  role: {role}");
            }
            println!("  active: {}", user.is_active);
        }
        Command::Notes(command) => run_notes_command(&client, command).await?,
    }

    Ok(())
}

async fn run_notes_command(client: &ApiClient, command: NotesCommand) -> Result<()> {
    match command {
        NotesCommand::List => {
            let notes = client.list_notes().await?;
            if notes.is_empty() {
                println!("No notes yet");
            }
            for note in notes {
                println!(
                    "{:>5}  {}  ({} attachments)",
                    note.id,
                    note.title,
                    note.attachment_count()
                );
            }
        }
        NotesCommand::Get { id } => {
            let note = client.get_note(id).await?;
            println!("# {} (id {})", note.title, note.id);
            println!("{}", note.content);
            for url in note
                .image_urls
                .iter()
                .chain(&note.video_urls)
                .chain(&note.audio_urls)
            {
                println!("  attachment: {url}");
            }
        }
        NotesCommand::Create {
            title,
            content,
            files,
        } => {
            let uploads = read_upload_files(&files)?;
            client.create_note(&title, &content, &uploads).await?;
            println!("Created note \"{title}\" with {} attachments", uploads.len());
        }
        NotesCommand::Delete { id } => {
            client.delete_note(id).await?;
            println!("Deleted note {id}");
        }
    }
    Ok(())
}

/// Read attachment files, skipping those with unsupported extensions.
fn read_upload_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?
            .to_string();

        if notekeep_core::models::MediaKind::from_file_name(&name).is_none() {
            warn!(file = %name, "Skipping file with unsupported extension");
            continue;
        }

        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        uploads.push(UploadFile::new(name, bytes));
    }
    Ok(uploads)
}

fn report_health(service: &str, result: Result<(), notekeep_core::ApiError>) {
    match result {
        Ok(()) => println!("{service}: ok"),
        Err(e) => println!("{service}: unavailable ({e})"),
    }
}
