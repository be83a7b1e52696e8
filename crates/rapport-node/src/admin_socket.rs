//! Unix socket server for admin commands.
//!
//! Provides a local IPC interface for promoting and demoting admins. The
//! protocol is one JSON object per line in each direction.

use crate::error::Result;
use crate::storage::Storage;
use rapport_graph::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Give the account registered under `email` the admin role
    PromoteAdmin { email: String },
    /// Return the account registered under `email` to the user role
    DemoteAdmin { email: String },
    /// List the emails of all admins
    ListAdmins,
    /// Check if the account registered under `email` is an admin
    IsAdmin { email: String },
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Bool { value: bool },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    storage: Arc<Storage>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(storage: Arc<Storage>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            socket_path: socket_path.into(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Stale socket from a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let storage = Arc::clone(&self.storage);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, storage).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, storage: Arc<Storage>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &storage),
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

fn set_role(storage: &Storage, email: &str, role: Role) -> AdminResponse {
    let email = email.trim().to_lowercase();
    match storage.set_role_by_email(&email, role) {
        Ok(account) => {
            tracing::info!(account = %account.id, role = %role, "role changed via admin socket");
            AdminResponse::Ok {
                message: format!("{} is now {}", email, role),
            }
        }
        Err(e) => AdminResponse::Error {
            error: e.to_string(),
        },
    }
}

/// Execute one admin command against storage.
pub fn execute_command(cmd: AdminCommand, storage: &Storage) -> AdminResponse {
    match cmd {
        AdminCommand::PromoteAdmin { email } => set_role(storage, &email, Role::Admin),

        AdminCommand::DemoteAdmin { email } => set_role(storage, &email, Role::User),

        AdminCommand::ListAdmins => {
            let emails = storage.list_admins().and_then(|ids| {
                let mut emails = Vec::new();
                for id in ids {
                    if let Some(account) = storage.get_account(&id)? {
                        emails.push(account.email);
                    }
                }
                Ok(emails)
            });
            match emails {
                Ok(items) => AdminResponse::List { items },
                Err(e) => AdminResponse::Error {
                    error: e.to_string(),
                },
            }
        }

        AdminCommand::IsAdmin { email } => {
            match storage.get_account_by_email(&email.trim().to_lowercase()) {
                Ok(Some(account)) => AdminResponse::Bool {
                    value: account.is_admin(),
                },
                Ok(None) => AdminResponse::Error {
                    error: format!("no account with email {}", email),
                },
                Err(e) => AdminResponse::Error {
                    error: e.to_string(),
                },
            }
        }

        AdminCommand::Ping => AdminResponse::Pong,
    }
}
