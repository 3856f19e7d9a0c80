//! edca CLI application.
//!
//! Three commands: create a root authority, and issue server or client
//! certificates signed by it.

use clap::{Args, Parser, Subcommand};
use edca::cert::loader::AuthorityPaths;
use edca::cert::x509_signing::NativeToolkit;
use edca::config::{
    IssuanceSettings, Role, DEFAULT_AUTHORITY_SUBJECT, DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER,
};
use edca::error::Result;
use edca::issuance::{issue, IssuanceRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edca")]
#[command(about = "Minimal Ed25519 certificate authority", long_about = None)]
struct Cli {
    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a self-signed root authority (key + certificate)
    InitAuthority {
        /// Certificate subject, a bare common name or "CN=...,O=..."
        #[arg(long, default_value = DEFAULT_AUTHORITY_SUBJECT)]
        subject: String,

        /// Output certificate file
        #[arg(long, default_value = "ca.crt")]
        cert: PathBuf,

        /// Output private key file
        #[arg(long, default_value = "ca.key")]
        key: PathBuf,
    },

    /// Issue a server certificate signed by an authority
    IssueServerCert(LeafArgs),

    /// Issue a client certificate signed by an authority
    IssueClientCert(LeafArgs),
}

#[derive(Args)]
struct LeafArgs {
    /// Authority certificate file
    #[arg(long)]
    authority_cert: PathBuf,

    /// Authority private key file
    #[arg(long)]
    authority_key: PathBuf,

    /// Certificate subject, a bare common name or "CN=...,O=..."
    #[arg(long)]
    subject: String,

    /// Output certificate file [default: server.crt / client.crt]
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Output private key file [default: server.key / client.key]
    #[arg(long)]
    key: Option<PathBuf>,
}

impl LeafArgs {
    fn into_request(self, role: Role) -> IssuanceRequest {
        IssuanceRequest::leaf(
            role,
            self.subject,
            self.cert.unwrap_or_else(|| role.default_cert_path()),
            self.key.unwrap_or_else(|| role.default_key_path()),
            AuthorityPaths {
                cert: self.authority_cert,
                key: self.authority_key,
            },
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let request = match cli.command {
        Commands::InitAuthority { subject, cert, key } => {
            IssuanceRequest::authority(subject, cert, key)
        }
        Commands::IssueServerCert(args) => args.into_request(Role::Server),
        Commands::IssueClientCert(args) => args.into_request(Role::Client),
    };

    let report = issue(&NativeToolkit, &request, &IssuanceSettings::default())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(())
}
