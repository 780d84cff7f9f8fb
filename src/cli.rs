use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;

use crate::config::{parse_config, ConnectionConfig, Settings};
use crate::error::ConfigError;

/// Uploads a file for processing, waits for the result and downloads it
///
/// Connection values left out on the command line are taken from the
/// `--config` file, then from defaults. The password may also come from the
/// BULKXFER_PASSWORD environment variable.
#[derive(Parser, Debug)]
#[command(name = crate::PROGRAM_NAME)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The file path of the upload file
    #[arg(short, long)]
    pub file: PathBuf,

    /// The directory where the results file should be placed
    #[arg(short, long)]
    pub location: PathBuf,

    /// The username defined in the manage api keys section
    #[arg(short, long)]
    pub username: Option<String>,

    /// The password defined in the manage api keys section (the API key for http)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Seconds between checks for the results [default: 300, max: 86400]
    #[arg(long)]
    pub poll: Option<u64>,

    /// The host to connect to [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// The port to connect to [default: 21 for ftp, 80 for http]
    #[arg(long)]
    pub port: Option<u16>,

    /// Whether to run in single file mode
    #[arg(long)]
    pub single_file: bool,

    /// Delete the results from the server after downloading them
    #[arg(long)]
    pub remove: bool,

    /// Transfer protocol: ftp or http [default: http]
    #[arg(long)]
    pub protocol: Option<String>,

    /// Address notified by the server when processing finishes (http only)
    #[arg(long)]
    pub notify_email: Option<String>,

    /// JSON file with connection settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write log lines to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Connection settings given on the command line
    pub fn to_settings(&self) -> Settings {
        Settings {
            username: self.username.clone(),
            password: self.password.clone().map(SecretString::new),
            host: self.host.clone(),
            port: self.port,
            poll: self.poll,
            protocol: self.protocol.clone(),
            notify_email: self.notify_email.clone(),
        }
    }
}

/// Builds the connection config: command line, then `--config` file, then defaults
pub fn resolve_config(args: &Args) -> Result<ConnectionConfig, ConfigError> {
    let file = match &args.config {
        Some(path) => parse_config(&path.to_string_lossy())?,
        None => Settings::default(),
    };
    args.to_settings().or(file).resolve()
}

/// Parses the process arguments, exiting with usage on error
pub fn parse_args() -> Args {
    Args::parse()
}
