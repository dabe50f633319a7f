//! Inspect command - Show how each property of an object is intercepted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use propwatch::prelude::*;
use propwatch_engine::PropertySummary;

use crate::OutputFormat;
use crate::commands::{load_object, load_settings, print_json};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the JSON object to inspect
    #[arg(required = true)]
    pub object: PathBuf,

    /// Only inspect these properties (default: the settings file selection,
    /// else every own property)
    #[arg(short, long = "property")]
    pub properties: Vec<String>,
}

/// Inspection result.
#[derive(Debug, Serialize)]
struct InspectionResult {
    path: String,
    properties: Vec<PropertySummary>,
}

/// Classify the selected properties of `target`, leaving it unchanged.
fn inspect(target: &Object, selection: PropertySelection) -> Result<Vec<PropertySummary>> {
    let runtime = Propwatch::builder()
        .with_isolated_context()
        .with_async(false)
        .build();
    let settings = ObserverSettings {
        auto_observe: Some(false),
        ..Default::default()
    };
    let observer = runtime
        .observe_with(target.clone(), settings)
        .context("Failed to create observer")?;

    for name in selection.resolve(target) {
        observer
            .create_property_observation(&name)
            .with_context(|| format!("Cannot observe '{name}'"))?;
    }
    let summaries = observer.summaries();
    observer.unobserve().context("Failed to restore object")?;
    Ok(summaries)
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let settings = load_settings(config)?;
    let target = load_object(&args.object)?;

    let selection = if !args.properties.is_empty() {
        PropertySelection::Names(args.properties)
    } else {
        settings
            .properties
            .unwrap_or_else(|| PropertySelection::Names(target.own_property_names()))
    };

    let result = InspectionResult {
        path: args.object.display().to_string(),
        properties: inspect(&target, selection)?,
    };

    match format {
        OutputFormat::Human => {
            println!("Object: {}", result.path);
            println!("Properties: {}", result.properties.len());
            for summary in &result.properties {
                let mut flags = Vec::new();
                if summary.is_getable {
                    flags.push("get");
                }
                if summary.is_setable {
                    flags.push("set");
                }
                if summary.is_enumerable {
                    flags.push("enumerable");
                }
                if !summary.defined {
                    flags.push("undefined");
                }
                println!("  {:<20} {:<9} {}", summary.name, summary.kind, flags.join(", "));
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => print_json(&result, format)?,
    }
    Ok(())
}
