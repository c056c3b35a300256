//! Scan command - list discovered invoices without calling any service.

use std::path::PathBuf;

use clap::Args;
use console::style;

use invscan_core::ImageFilter;
use invscan_core::scan::discover;

use super::{ModeArg, load_config};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Directory holding the invoice folders
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// How images are grouped into invoices
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,
}

pub fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let base_dir = args.base_dir.unwrap_or(config.paths.base_dir);
    let mode = args.mode.map(Into::into).unwrap_or(config.scan.mode);

    let filter = ImageFilter::new(&config.scan.patterns)?;
    let groups = discover(&base_dir, mode, &filter)?;

    if groups.is_empty() {
        println!(
            "{} No invoices found in {}",
            style("⚠").yellow(),
            base_dir.display()
        );
        return Ok(());
    }

    for group in &groups {
        let output = group.relative_dir.join(format!("{}.json", group.id));
        println!(
            "{}  {} page(s)  -> {}",
            style(&group.id).bold(),
            group.images.len(),
            output.display()
        );
        for image in &group.images {
            let shown = image.strip_prefix(&base_dir).unwrap_or(image);
            println!("    {}", style(shown.display()).dim());
        }
    }

    let pages: usize = groups.iter().map(|g| g.images.len()).sum();
    println!();
    println!(
        "{} {} invoice(s), {} page(s)",
        style("ℹ").blue(),
        groups.len(),
        pages
    );

    Ok(())
}
