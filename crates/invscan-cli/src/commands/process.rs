//! Process command - extract one invoice from explicit images.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use invscan_core::invoice::to_rows;
use invscan_core::pipeline::{InvoicePipeline, PipelineOptions};
use invscan_core::scan::folder_images;
use invscan_core::{GeminiClient, ImageFilter, InvoiceGroup, LocationResolver, SheetsClient};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Invoice folder or page images, in page order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Invoice id (default: name of the first input)
    #[arg(long)]
    id: Option<String>,

    /// Append the rows to the configured Google Sheet
    #[arg(long)]
    upload: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let filter = ImageFilter::new(&config.scan.patterns)?;

    let images = collect_images(&args.inputs, &filter)?;
    let id = match args.id {
        Some(id) => id,
        None => default_id(&args.inputs[0]),
    };
    let group = InvoiceGroup::new(id, images);

    // Fail on missing credentials before spending a model call
    let sheets = if args.upload {
        match SheetsClient::from_config(&config.sheets)? {
            Some(client) => Some(client),
            None => anyhow::bail!(
                "Google Sheets is not configured. Set GOOGLE_SHEETS_ID and SERVICE_ACCOUNT_FILE."
            ),
        }
    } else {
        None
    };

    let model = GeminiClient::new(&config.gemini)?;
    let pipeline = InvoicePipeline::new(
        model,
        LocationResolver::new(&config.locations),
        PipelineOptions {
            output_dir: config.paths.output_dir.clone(),
            fail_fast: true,
        },
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!(
        "Extracting invoice {} ({} page(s))...",
        group.id,
        group.images.len()
    ));

    let invoice = match pipeline.process_group(&group).await {
        Ok(invoice) => {
            pb.finish_and_clear();
            invoice
        }
        Err(e) => {
            pb.abandon();
            return Err(e.into());
        }
    };

    let issues = invoice.validate();
    if !issues.is_empty() {
        eprintln!("{}", style("Validation issues:").yellow());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
    }

    let output = serde_json::to_string_pretty(&invoice)?;
    if let Some(output_path) = &args.output {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(mut client) = sheets {
        let rows = to_rows(&invoice);
        if rows.is_empty() {
            println!("{} No line items to upload", style("ℹ").blue());
        } else {
            client.append(&rows).await?;
            println!(
                "{} Appended {} row(s) to {}",
                style("✓").green(),
                rows.len(),
                client.sheet_name()
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Expand folders into their images and keep explicit files as given.
fn collect_images(inputs: &[PathBuf], filter: &ImageFilter) -> anyhow::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for input in inputs {
        if input.is_dir() {
            images.extend(folder_images(input, filter)?);
        } else if input.is_file() {
            images.push(input.clone());
        } else {
            anyhow::bail!("Input not found: {}", input.display());
        }
    }

    if images.is_empty() {
        anyhow::bail!("No invoice images found in the given inputs");
    }
    Ok(images)
}

fn default_id(input: &Path) -> String {
    let name = if input.is_dir() {
        input.file_name()
    } else {
        input.file_stem()
    };
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "invoice".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_images_expands_folders() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("inv-7");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("b.png"), b"x").unwrap();
        fs::write(folder.join("a.jpg"), b"x").unwrap();
        fs::write(folder.join("notes.txt"), b"x").unwrap();
        let extra = dir.path().join("back.png");
        fs::write(&extra, b"x").unwrap();

        let images =
            collect_images(&[folder.clone(), extra.clone()], &ImageFilter::default()).unwrap();

        assert_eq!(images, vec![folder.join("a.jpg"), folder.join("b.png"), extra]);
        assert_eq!(default_id(&folder), "inv-7");
        assert_eq!(default_id(&dir.path().join("back.png")), "back");
    }

    #[test]
    fn test_collect_images_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_images(&[dir.path().join("nope.png")], &ImageFilter::default()).is_err());
    }
}
