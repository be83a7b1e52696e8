//! rapport-admin CLI tool
//!
//! Promotes and demotes admins on a running rapport-node over its admin
//! socket.
//!
//! Usage:
//!   rapport-admin promote-admin <email>
//!   rapport-admin demote-admin <email>
//!   rapport-admin list-admins
//!   rapport-admin is-admin <email>
//!   rapport-admin ping

use clap::{Parser, Subcommand};
use rapport_node::admin_socket::{AdminCommand, AdminResponse};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "rapport-admin", about = "Manage Rapport node admins")]
struct Cli {
    /// Path to the node's admin socket
    #[arg(
        long,
        env = "RAPPORT_SOCKET",
        default_value = "./rapport-data/admin.sock"
    )]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Give an account the admin role
    PromoteAdmin { email: String },
    /// Return an admin to the user role
    DemoteAdmin { email: String },
    /// List admin emails
    ListAdmins,
    /// Check if an account is an admin (exit code 1 if not)
    IsAdmin { email: String },
    /// Check if the daemon is running
    Ping,
}

impl From<Command> for AdminCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::PromoteAdmin { email } => AdminCommand::PromoteAdmin { email },
            Command::DemoteAdmin { email } => AdminCommand::DemoteAdmin { email },
            Command::ListAdmins => AdminCommand::ListAdmins,
            Command::IsAdmin { email } => AdminCommand::IsAdmin { email },
            Command::Ping => AdminCommand::Ping,
        }
    }
}

fn send_command(socket_path: &Path, cmd: &AdminCommand) -> Result<AdminResponse, String> {
    let mut stream = UnixStream::connect(socket_path).map_err(|e| {
        format!(
            "Failed to connect to rapport-node at {:?}: {}\n\
             Is the rapport-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn main() {
    let cli = Cli::parse();
    let cmd = AdminCommand::from(cli.command);

    match send_command(&cli.socket, &cmd) {
        Ok(AdminResponse::Ok { message }) => println!("{}", message),
        Ok(AdminResponse::Error { error }) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
        Ok(AdminResponse::List { items }) => {
            if items.is_empty() {
                println!("(none)");
            }
            for item in items {
                println!("{}", item);
            }
        }
        Ok(AdminResponse::Bool { value }) => {
            println!("{}", value);
            if !value {
                std::process::exit(1);
            }
        }
        Ok(AdminResponse::Pong) => println!("pong - rapport-node is running"),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
