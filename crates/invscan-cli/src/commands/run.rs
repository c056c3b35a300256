//! Run command - process every invoice under the base directory.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use invscan_core::output::write_summary;
use invscan_core::pipeline::{GroupStatus, InvoicePipeline, PipelineOptions};
use invscan_core::scan::discover;
use invscan_core::{
    CsvRowSink, GeminiClient, ImageFilter, LocationResolver, RowSinks, SheetsClient,
};

use super::{ModeArg, load_config};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Directory holding the invoice folders
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// Directory for the parsed JSON files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// How images are grouped into invoices
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Do not upload rows to Google Sheets
    #[arg(long)]
    no_sheets: bool,

    /// Also append rows to a local CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write summary.csv to the output directory
    #[arg(long)]
    summary: bool,

    /// Stop at the first failed invoice
    #[arg(long)]
    fail_fast: bool,
}

pub async fn run(args: RunArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;

    if let Some(dir) = args.base_dir {
        config.paths.base_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.paths.output_dir = dir;
    }
    if let Some(mode) = args.mode {
        config.scan.mode = mode.into();
    }

    let filter = ImageFilter::new(&config.scan.patterns)?;
    let groups = discover(&config.paths.base_dir, config.scan.mode, &filter)?;

    if groups.is_empty() {
        println!(
            "{} No invoices found in {}",
            style("⚠").yellow(),
            config.paths.base_dir.display()
        );
        return Ok(());
    }

    println!(
        "{} Found {} invoice(s) in {}",
        style("ℹ").blue(),
        groups.len(),
        config.paths.base_dir.display()
    );

    let model = GeminiClient::new(&config.gemini)?;

    let mut sinks = RowSinks::new();
    if args.no_sheets {
        info!("Google Sheets upload disabled");
    } else {
        match SheetsClient::from_config(&config.sheets)? {
            Some(client) => {
                info!("Appending rows to sheet {}", client.sheet_name());
                sinks = sinks.with_sheets(client);
            }
            None => warn!(
                "Google Sheets is not configured (set GOOGLE_SHEETS_ID and SERVICE_ACCOUNT_FILE); rows will not be uploaded"
            ),
        }
    }
    if let Some(path) = args.csv {
        sinks = sinks.with_csv(CsvRowSink::new(path));
    }

    let resolver = LocationResolver::new(&config.locations);
    let pipeline = InvoicePipeline::new(
        model,
        resolver,
        PipelineOptions {
            output_dir: config.paths.output_dir.clone(),
            fail_fast: args.fail_fast,
        },
    );

    let pb = ProgressBar::new(groups.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} invoices {msg}")?
            .progress_chars("=>-"),
    );

    let result = pipeline
        .run_with_progress(&groups, &mut sinks, |outcome| {
            pb.set_message(outcome.id.clone());
            pb.inc(1);
        })
        .await;

    let report = match result {
        Ok(report) if report.aborted_at.is_some() => {
            pb.abandon_with_message("Stopped");
            report
        }
        Ok(report) => {
            pb.finish_with_message("Complete");
            report
        }
        Err(e) => {
            pb.abandon();
            return Err(e.into());
        }
    };

    if args.summary {
        let summary_path = config.paths.output_dir.join("summary.csv");
        write_summary(&summary_path, &report.outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} invoice(s) in {:?}",
        style("✓").green(),
        report.outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} partial, {} failed, {} row(s) appended",
        style(report.succeeded()).green(),
        style(report.partial()).yellow(),
        style(report.failed()).red(),
        report.rows_appended()
    );

    let problems: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.status != GroupStatus::Success)
        .collect();
    if !problems.is_empty() {
        println!();
        println!("{}", style("Invoices needing attention:").red());
        for outcome in problems {
            println!(
                "  - {} ({}): {}",
                outcome.id,
                outcome.status.as_str(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(id) = &report.aborted_at {
        anyhow::bail!("Stopped at failed invoice {} (--fail-fast)", id);
    }

    Ok(())
}
