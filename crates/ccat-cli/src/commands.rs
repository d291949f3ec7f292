use std::path::Path;

use anyhow::Context;
use ccat_catalog::{Catalog, CatalogBuilder, CatalogFile, LocationData, Manifest, ResourceLocation};
use ccat_store::StoreConfig;
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Build(args) => cmd_build(args, &config, cli.format),
        Command::Inspect(args) => cmd_inspect(args, &config, cli.format),
        Command::Keys(args) => cmd_keys(args, &config, cli.format),
        Command::Locate(args) => cmd_locate(args, &config, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            StoreConfig::load(path).with_context(|| format!("reading {}", path.display()))
        }
        None => Ok(StoreConfig::default()),
    }
}

fn open_catalog(path: &Path, config: &StoreConfig) -> anyhow::Result<(CatalogFile, Catalog)> {
    let file = CatalogFile::read_from(path).with_context(|| format!("opening {}", path.display()))?;
    let catalog = Catalog::from_file(file.clone(), &config.reader)?;
    Ok((file, catalog))
}

fn cmd_build(args: BuildArgs, config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("reading {}", args.manifest.display()))?;
    let manifest = Manifest::from_json(&json)
        .with_context(|| format!("parsing {}", args.manifest.display()))?;

    let builder = CatalogBuilder::from_manifest(&manifest)?
        .with_config(config.writer.clone())
        .with_compression(args.compress);
    let file = builder.build()?;
    let encoded = file.to_bytes()?;
    std::fs::write(&args.output, &encoded)
        .with_context(|| format!("writing {}", args.output.display()))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "output": args.output.display().to_string(),
                "locations": builder.location_count(),
                "keys": builder.key_count(),
                "blob_bytes": file.blob().len(),
                "file_bytes": encoded.len(),
                "compressed": file.is_compressed(),
            })
        ),
        OutputFormat::Text => {
            println!(
                "{} Built {} ({} locations, {} keys)",
                "✓".green().bold(),
                args.output.display().to_string().bold(),
                builder.location_count(),
                builder.key_count()
            );
            println!("  Blob: {} bytes, file: {} bytes", file.blob().len(), encoded.len());
        }
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (file, catalog) = open_catalog(&args.file, config)?;
    let dependencies = catalog.dependency_count()?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "locator_id": catalog.locator_id(),
                "header_id": file.header().as_u32(),
                "compressed": file.is_compressed(),
                "blob_bytes": file.blob().len(),
                "locations": catalog.location_count(),
                "keys": catalog.key_count(),
                "dependencies": dependencies,
            })
        ),
        OutputFormat::Text => {
            println!("Catalog {}", catalog.locator_id().yellow().bold());
            println!("  Header: {}", file.header().to_string().cyan());
            println!(
                "  Blob: {} bytes{}",
                file.blob().len(),
                if file.is_compressed() { " (zstd)" } else { "" }
            );
            println!("  Locations: {}", catalog.location_count().to_string().bold());
            println!("  Keys: {}", catalog.key_count().to_string().bold());
            println!("  Dependencies: {}", dependencies);
        }
    }
    Ok(())
}

fn cmd_keys(args: KeysArgs, config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (_, catalog) = open_catalog(&args.file, config)?;
    match format {
        OutputFormat::Json => {
            let keys: Vec<&str> = catalog.keys().collect();
            println!("{}", serde_json::to_string(&keys)?);
        }
        OutputFormat::Text => {
            for key in catalog.keys() {
                println!("{key}");
            }
        }
    }
    Ok(())
}

fn cmd_locate(args: LocateArgs, config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let (_, catalog) = open_catalog(&args.file, config)?;
    let Some(locations) = catalog.locate(&args.key)? else {
        anyhow::bail!("key not found: {}", args.key);
    };

    match format {
        OutputFormat::Json => {
            let locations: Vec<&ResourceLocation> = locations.iter().map(|l| &**l).collect();
            println!("{}", serde_json::to_string_pretty(&locations)?);
        }
        OutputFormat::Text => {
            for location in &locations {
                print_location(location, 0);
            }
        }
    }
    Ok(())
}

fn print_location(location: &ResourceLocation, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{}", location.internal_id.green());
    println!("{indent}  provider: {}", location.provider_id);
    println!("{indent}  type: {}", location.resource_type.cyan());
    if location.primary_key != location.internal_id {
        println!("{indent}  key: {}", location.primary_key);
    }
    match &location.data {
        Some(LocationData::Bundle(options)) => println!(
            "{indent}  bundle: {} crc={:08x} size={}",
            options.bundle_name.yellow(),
            options.crc,
            options.bundle_size
        ),
        Some(LocationData::Text(text)) => println!("{indent}  data: {text:?}"),
        None => {}
    }
    for dependency in &location.dependencies {
        print_location(dependency, depth + 1);
    }
}
