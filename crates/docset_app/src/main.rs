//! `docset`: turns a downloaded cljdoc HTML bundle into an offline docset.
//!
//! Usage:
//!   docset build --bundle <DIR> --name <NAME>    Build `<NAME>.docset`
//!   docset entries --bundle <DIR>                 List the entries that would be indexed
//!   docset localize --documents <DIR>             Localize remote images in place

mod config;
mod progress;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docset_engine::{
    parse_all_entries, write_report, DocsetEngine, DocsetLayout, DocsetMetadata, SearchIndex,
};
use engine_logging::{engine_info, engine_warn, LogDestination};
use log::LevelFilter;

use crate::config::{AppConfig, Overrides};
use crate::progress::LogProgressSink;

#[derive(Parser)]
#[command(name = "docset", version, about = "Build offline docsets from cljdoc bundles")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Where log output goes
    #[arg(long, value_enum, global = true, default_value_t = LogTarget::Terminal)]
    log: LogTarget,

    /// Log file used by `--log file` and `--log both`
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build a complete docset from an extracted bundle
    Build {
        /// Root of the extracted HTML bundle
        #[arg(long)]
        bundle: PathBuf,
        /// Docset name; the output is `<NAME>.docset`
        #[arg(long)]
        name: String,
        /// Directory the docset is created in
        #[arg(long, default_value = ".")]
        output: PathBuf,
        /// PNG icon installed as `icon.png`
        #[arg(long)]
        icon: Option<PathBuf>,
        /// RON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Parallel image downloads per page
        #[arg(long)]
        concurrency: Option<usize>,
        /// Attempts per image, including the first
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Index only; keep remote images remote
        #[arg(long)]
        skip_images: bool,
    },
    /// Print the entries extracted from a bundle
    Entries {
        #[arg(long)]
        bundle: PathBuf,
        /// Print JSON instead of tab separated lines
        #[arg(long)]
        json: bool,
    },
    /// Localize remote images of an existing documents directory in place
    Localize {
        #[arg(long)]
        documents: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(cli.log.into(), level, cli.log_file.as_deref());

    match cli.command {
        Command::Build {
            bundle,
            name,
            output,
            icon,
            config,
            concurrency,
            max_attempts,
            skip_images,
        } => {
            let config = AppConfig::load(config.as_deref())?.apply(Overrides {
                concurrency,
                max_attempts,
            });
            build(&bundle, &name, &output, icon.as_deref(), &config, skip_images)
        }
        Command::Entries { bundle, json } => entries(&bundle, json),
        Command::Localize {
            documents,
            config,
            concurrency,
            max_attempts,
        } => {
            let config = AppConfig::load(config.as_deref())?.apply(Overrides {
                concurrency,
                max_attempts,
            });
            localize(&documents, &config)
        }
    }
}

fn build(
    bundle: &Path,
    name: &str,
    output: &Path,
    icon: Option<&Path>,
    config: &AppConfig,
    skip_images: bool,
) -> Result<()> {
    let layout = DocsetLayout::new(output, name);
    if layout.root().exists() {
        engine_info!("Replacing existing {:?}", layout.root());
        fs::remove_dir_all(layout.root())
            .with_context(|| format!("cannot remove {}", layout.root().display()))?;
    }
    layout.copy_bundle(bundle)?;

    let engine = DocsetEngine::new(config.engine_config(!skip_images))?;
    let documents = layout.documents_dir();
    let result = engine.run(bundle, &documents, &LogProgressSink)?;

    let mut index = SearchIndex::create(&layout.index_path())?;
    let inserted = index.store(&result.entries)?;

    layout.write_info_plist(&DocsetMetadata::new(name, &config.platform_family))?;
    if let Some(icon) = icon {
        layout.install_icon(icon)?;
    }
    let report = write_report(layout.root(), &result)?;

    let localization = &result.localization;
    println!(
        "{}: {} entries indexed, {}/{} images localized",
        layout.root().display(),
        inserted,
        localization.successful,
        localization.total
    );
    if localization.failed > 0 || !result.extraction_failures.is_empty() {
        engine_warn!("Some pages or images failed, see {:?}", report);
    }
    Ok(())
}

fn entries(bundle: &Path, json: bool) -> Result<()> {
    let entries = parse_all_entries(bundle)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}\t{}\t{}", entry.entry_type, entry.name, entry.path);
        }
    }
    Ok(())
}

fn localize(documents: &Path, config: &AppConfig) -> Result<()> {
    let engine = DocsetEngine::new(config.engine_config(true))?;
    let summary = engine.localize(documents, &LogProgressSink)?;
    println!(
        "{}/{} images localized, {} failed, {} pages unreadable",
        summary.successful,
        summary.total,
        summary.failed,
        summary.failed_pages.len()
    );
    for file in summary.files_with_images() {
        for failure in file.failures() {
            println!(
                "{}\t{}\t{}",
                file.path,
                failure.source_url,
                failure.error.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}
