//! lotcsv: Fetch Living-off-the-Land datasets and convert them to CSV
//!
//! Usage:
//!   # Every source
//!   lotcsv --all
//!
//!   # Specific sources, with lots-project detail pages
//!   lotcsv -g lolbas,gtfobins,lots_project --additional-lots-project
//!
//!   # Show how one YAML file flattens
//!   lotcsv --inspect LOLBAS/yml/OSBinaries/Certutil.yml

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::{ArgAction, ArgGroup, Parser};
use lotcsv::flatten::DocumentFormat;
use lotcsv::sources::SOURCE_NAMES;
use lotcsv::{inspect_file, resolve_selection, run_selected, ExportConfig, HttpRetriever, SourceContext};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lotcsv", version, disable_version_flag = true)]
#[command(about = "Fetch Living-off-the-Land datasets and convert them to CSV", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .multiple(true)
        .args(["all", "get_specific", "inspect"])
))]
struct Args {
    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    _version: Option<bool>,

    /// Get all sources and convert them to CSV
    #[arg(short, long)]
    all: bool,

    /// Get specific sources (comma-separated)
    #[arg(
        short = 'g',
        long,
        value_name = "SOURCES",
        value_delimiter = ',',
        value_parser = PossibleValuesParser::new(SOURCE_NAMES)
    )]
    get_specific: Vec<String>,

    /// Also fetch every lots-project site page (more traffic to the website)
    #[arg(long = "additional-lots-project", visible_alias = "alp")]
    additional_lots_project: bool,

    /// Flatten one YAML or Markdown file and print the records and keys
    #[arg(long, value_name = "FILE", conflicts_with_all = ["all", "get_specific"])]
    inspect: Option<PathBuf>,

    /// Directory receiving the CSV files (default: export)
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Directory holding the upstream repository clones (default: .)
    #[arg(long)]
    mirror_dir: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds (default: 10)
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(path) = args.inspect {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("md") => DocumentFormat::FrontMatter,
            _ => DocumentFormat::Yaml,
        };
        println!("{}", inspect_file(&path, format)?);
        return Ok(());
    }

    // Build config
    let mut config = ExportConfig::default();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = args.mirror_dir {
        config.mirror_dir = dir;
    }
    if let Some(secs) = args.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }

    let retriever = HttpRetriever::new(config.request_timeout)?;

    info!("Checking network connectivity...");
    if retriever.check_connectivity() {
        info!("Network connectivity confirmed");
    } else {
        warn!("Network connectivity check failed. Some sources may not work properly");
    }

    let selected = resolve_selection(&args.get_specific, args.all, args.additional_lots_project);
    let ctx = SourceContext::new(&retriever, &config);
    let outcomes = run_selected(&selected, &ctx);

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name.as_str())
        .collect();
    if failed.is_empty() {
        info!("{} sources exported", outcomes.len());
    } else {
        warn!(
            "{} of {} sources failed: {}",
            failed.len(),
            outcomes.len(),
            failed.join(", ")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_and_specific_together() {
        let args = Args::try_parse_from(["lotcsv", "-a", "-g", "lolbas,gtfobins"]).unwrap();
        assert!(args.all);
        assert_eq!(args.get_specific, vec!["lolbas", "gtfobins"]);
        assert_eq!(
            resolve_selection(&args.get_specific, args.all, args.additional_lots_project),
            vec!["lolbas", "gtfobins"]
        );
    }

    #[test]
    fn test_inspect_is_exclusive() {
        assert!(Args::try_parse_from(["lotcsv", "--inspect", "a.yml", "-a"]).is_err());
        assert!(Args::try_parse_from(["lotcsv", "--inspect", "a.yml"]).is_ok());
    }

    #[test]
    fn test_a_mode_is_required() {
        assert!(Args::try_parse_from(["lotcsv"]).is_err());
    }

    #[test]
    fn test_short_v_prints_version() {
        let err = Args::try_parse_from(["lotcsv", "-v"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        let err = Args::try_parse_from(["lotcsv", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_command_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
