use anyhow::{anyhow, Context, Result};
use clap::Parser;
use console::style;
use env_logger::Env;
use log::{debug, info, LevelFilter};
use std::path::PathBuf;

use pmpack::{convert, ConversionReport, ConvertOptions, Mode, Notifier};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "Conversion mode: unpack, repack, normalize or verify")]
    mode: String,

    #[arg(help = "Source path (.pmp container, or unpacked folder for repack)")]
    source: PathBuf,

    #[arg(help = "Destination path (omit for verify)")]
    dest: Option<PathBuf>,

    #[arg(long, help = "Replace conflicting files in the destination")]
    overwrite: bool,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity level
    let log_level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(log_level)
        .init();

    // Resolve the mode up front: an unknown mode must fail before any
    // filesystem access happens.
    let mode: Mode = cli.mode.parse().map_err(|e| anyhow!("{e}"))?;

    info!("Starting pmpack in {} mode: {}", mode.as_str(), cli.source.display());
    debug!("Destination: {:?}", cli.dest);

    let notifier = Notifier::new(cli.verbose);
    let opts = ConvertOptions {
        overwrite: cli.overwrite,
        ..Default::default()
    };

    let report = convert(mode, &cli.source, cli.dest.as_deref(), &opts, &notifier)
        .with_context(|| format!("{} failed for {}", mode.as_str(), cli.source.display()))?;

    match &report {
        ConversionReport::Unpacked(unpacked) => {
            println!(
                "{} {} entries unpacked, {} skipped",
                style("Done:").green().bold(),
                unpacked.written.len(),
                unpacked.skipped.len()
            );
            for skipped in &unpacked.skipped {
                eprintln!("  skipped {}: {}", skipped.name, skipped.reason);
            }
        }
        ConversionReport::Repacked(repacked) => {
            println!(
                "{} {} entries packed ({} referenced assets, {} unreferenced)",
                style("Done:").green().bold(),
                repacked.entries.len(),
                repacked.referenced,
                repacked.unreferenced
            );
        }
        ConversionReport::Normalized { unpacked, repacked } => {
            println!(
                "{} normalized {} entries ({} skipped on read)",
                style("Done:").green().bold(),
                repacked.entries.len(),
                unpacked.skipped.len()
            );
        }
        ConversionReport::Verified(verified) => {
            if verified.is_valid() {
                println!(
                    "{} container is valid ({} entries)",
                    style("OK:").green().bold(),
                    verified.entries
                );
            } else {
                for finding in &verified.findings {
                    eprintln!("  {}: {}", finding.entry, finding.problem);
                }
                return Err(anyhow!(
                    "container is not valid: {} problems found",
                    verified.findings.len()
                ));
            }
        }
    }

    Ok(())
}
