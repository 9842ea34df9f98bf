use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;

use toilet_feedback::config::{AppConfig, DataBackend};
use toilet_feedback::qr::generate_qr_codes;
use toilet_feedback::serve::serve_app;

#[derive(Parser, Debug)]
#[command(author, version, about = "Collect toilet feedback through per-location QR codes")]
struct Args {
    /// Path to config file (TOML format). Every setting has a default.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the landing page, QR gallery, feedback form and dashboard
    Serve {
        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Data service backend (overrides config file)
        #[arg(short, long, value_enum)]
        backend: Option<DataBackend>,
    },
    /// Generate one QR code image per location plus an index page
    GenerateQr,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Serve { port, backend } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(backend) = backend {
                config.backend = backend;
            }
            config.validate()?;
            serve_app(config)
        }
        Command::GenerateQr => generate_qr(&config),
    }
}

fn generate_qr(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let report = generate_qr_codes(&config.qr)?;

    println!(
        "QR code generation complete: {} generated, {} failed",
        report.generated.len(),
        report.failed.len()
    );
    println!("QR codes saved to: {}", config.qr.output_dir.display());
    println!("Overview page: {}", report.index_path.display());
    println!("View all QR codes at: {}/qr-codes", config.qr.base_url.trim_end_matches('/'));

    // Per-image failures are logged, not turned into an exit code
    for (id, message) in &report.failed {
        error!("Not generated: {} ({})", id, message);
    }
    info!("Done");
    Ok(())
}
