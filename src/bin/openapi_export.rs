//! Writes the v1 OpenAPI document to disk for client generation.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use procurement_api::openapi::ApiDocV1;
use utoipa::OpenApi;

#[derive(Parser, Debug)]
#[command(name = "openapi-export", about = "Export the procurement API OpenAPI document")]
struct Cli {
    /// Destination file; parent directories are created.
    #[arg(long, short, default_value = "openapi/procurement-api.v1.json")]
    output: PathBuf,

    /// Emit compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let document = ApiDocV1::openapi();
    let json = if cli.compact {
        serde_json::to_string(&document)?
    } else {
        serde_json::to_string_pretty(&document)?
    };

    if let Some(dir) = cli.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(&cli.output, json).with_context(|| format!("writing {}", cli.output.display()))?;

    println!(
        "{} paths written to {}",
        document.paths.paths.len(),
        cli.output.display()
    );
    Ok(())
}
