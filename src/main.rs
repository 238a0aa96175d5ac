use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use auth::PasswordSource;
use pwexport::crypto::AlgorithmParams;
use pwexport::{AlgorithmId, BackendKind, ExportConfig, Exporter, Storage};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Debug, Parser)]
#[command(name = "pwexport")]
#[command(
    version,
    about = "Protect exported data with a password as a single URL-safe string."
)]
struct Cli {
    /// Key derivation backend: native or portable
    #[arg(long, global = true, value_name = "BACKEND", env = "PWEXPORT_BACKEND")]
    backend: Option<BackendKind>,

    /// Read the password from the first line of stdin
    #[arg(long, global = true, default_value_t = false)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a payload into an export string
    Export {
        /// Payload to protect (default: stdin)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Where to write the export string (default: stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Key derivation algorithm id
        #[arg(long, default_value_t = AlgorithmId::CURRENT.0)]
        algorithm: u8,
    },

    /// Decrypts an export string back into its payload
    Import {
        /// Export string to open (default: stdin)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Where to write the payload (default: stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Shows the non-secret header of an export string
    Inspect {
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
    },

    /// Lists the supported key derivation algorithms
    Algorithms,
}

#[derive(Serialize)]
struct AlgorithmEntry {
    id: AlgorithmId,
    current: bool,
    #[serde(flatten)]
    params: &'static AlgorithmParams,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_payload(input: Option<&PathBuf>) -> Result<Zeroizing<Vec<u8>>> {
    match input {
        Some(path) => Ok(Zeroizing::new(Storage::new(path.clone()).load()?)),
        None => {
            let mut buf = Zeroizing::new(Vec::new());
            io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read payload from stdin")?;
            Ok(buf)
        }
    }
}

fn read_export(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => Storage::new(path.clone()).load_export(),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read export from stdin")?;
            Ok(buf.trim().to_string())
        }
    }
}

fn password_source(password_stdin: bool, input: Option<&PathBuf>) -> Result<PasswordSource> {
    let source = PasswordSource::detect(password_stdin);
    if matches!(source, PasswordSource::Stdin) && input.is_none() {
        bail!("--password-stdin needs --input, stdin cannot carry both");
    }
    Ok(source)
}

fn main() -> Result<()> {
    init_tracing();
    let args = Cli::parse();
    let backend = args.backend.unwrap_or_else(BackendKind::preferred);
    debug!(%backend, "selected key derivation backend");

    match args.command {
        Commands::Export {
            input,
            output,
            algorithm,
        } => {
            let exporter = Exporter::new(ExportConfig {
                algorithm: AlgorithmId(algorithm),
                backend,
            })?;
            let source = password_source(args.password_stdin, input.as_ref())?;
            let password = auth::read_new_password_with_confirmation(source)?;
            let plaintext = read_payload(input.as_ref())?;

            let text = exporter
                .export(&password, &plaintext)
                .context("export failed")?;
            drop(password);

            match output {
                Some(path) => {
                    Storage::new(path.clone()).save_export(&text)?;
                    eprintln!("export written to {}", path.display());
                }
                None => println!("{text}"),
            }
        }
        Commands::Import { input, output } => {
            let exporter = Exporter::new(ExportConfig {
                backend,
                ..ExportConfig::default()
            })?;
            let source = password_source(args.password_stdin, input.as_ref())?;
            let password = auth::read_password(source)?;
            let text = read_export(input.as_ref())?;

            let plaintext = exporter.import(&password, &text).context("import failed")?;
            drop(password);

            match output {
                Some(path) => {
                    Storage::new(path.clone()).save(&plaintext)?;
                    eprintln!("payload written to {}", path.display());
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&plaintext)?;
                    stdout.flush()?;
                }
            }
        }
        Commands::Inspect { input } => {
            let text = read_export(input.as_ref())?;
            let summary = pwexport::inspect(&text).context("not a valid export")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Algorithms => {
            let listing: Vec<AlgorithmEntry> = pwexport::crypto::algorithms()
                .map(|(id, params)| AlgorithmEntry {
                    id,
                    current: id == AlgorithmId::CURRENT,
                    params,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }

    Ok(())
}
