//! Subcommands and the input handling they share.

pub mod inspect;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use propwatch::prelude::*;

use crate::OutputFormat;

/// Prefix marking a string value as a builtin function.
const FUNCTION_PREFIX: &str = "fn:";

/// Load observer settings, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<ObserverSettings> {
    let Some(path) = path else {
        return Ok(ObserverSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid settings file {}", path.display()))
}

/// Load a JSON object file.
///
/// Top-level string values of the form `"fn:<name>"` become builtin
/// functions: `sum`, `concat`, `identity` or `len`.
pub fn load_object(path: &Path) -> Result<Object> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read object file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    object_from_json(json)
}

pub fn object_from_json(json: serde_json::Value) -> Result<Object> {
    if !json.is_object() {
        bail!("Expected a JSON object at the top level");
    }

    let object = Object::from_json(json);
    for (name, value) in object.data_entries() {
        let Some(builtin_name) = value.as_str().and_then(|s| s.strip_prefix(FUNCTION_PREFIX)) else {
            continue;
        };
        let function = builtin(builtin_name)
            .with_context(|| format!("Unknown builtin '{builtin_name}' for '{name}'"))?;
        object.insert(name, function);
    }
    Ok(object)
}

fn builtin(name: &str) -> Option<NativeFunction> {
    let function = match name {
        "sum" => NativeFunction::new("sum", |_, args| {
            Ok(Value::from(args.iter().filter_map(Value::as_number).sum::<f64>()))
        }),
        "concat" => NativeFunction::new("concat", |_, args| {
            Ok(Value::from(
                args.iter().map(ToString::to_string).collect::<String>(),
            ))
        }),
        "identity" => NativeFunction::new("identity", |_, args| {
            Ok(args.first().cloned().unwrap_or_default())
        }),
        "len" => NativeFunction::new("len", |_, args| Ok(Value::from(args.len() as f64))),
        _ => return None,
    };
    Some(function)
}

/// Print `value` as JSON in the requested layout.
pub fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let json = if matches!(format, OutputFormat::JsonCompact) {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}
