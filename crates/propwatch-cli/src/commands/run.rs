//! Run command - Observe an object while a script operates on it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use propwatch::prelude::*;
use propwatch_engine::event_name::ALL_EVENTS;
use propwatch_events::RecordedEvent;

use crate::OutputFormat;
use crate::commands::{load_object, load_settings, print_json};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the JSON object to observe
    #[arg(required = true)]
    pub object: PathBuf,

    /// Path to the TOML script of steps
    #[arg(short, long)]
    pub script: PathBuf,

    /// Dispatch listeners synchronously
    #[arg(long)]
    pub sync: bool,

    /// Cancel every write to this property (needs --sync to take effect)
    #[arg(long = "veto")]
    pub veto: Vec<String>,

    /// Show trigger statistics
    #[arg(long)]
    pub stats: bool,
}

/// A script file: a list of `[[step]]` tables.
#[derive(Debug, Default, Deserialize)]
struct Script {
    #[serde(default, rename = "step")]
    steps: Vec<Step>,
}

/// One scripted operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Step {
    Get {
        property: String,
    },
    Set {
        property: String,
        value: serde_json::Value,
    },
    Call {
        property: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
    Enable,
    Disable,
    Observe,
    Unobserve,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Get { .. } => "get",
            Step::Set { .. } => "set",
            Step::Call { .. } => "call",
            Step::Enable => "enable",
            Step::Disable => "disable",
            Step::Observe => "observe",
            Step::Unobserve => "unobserve",
        }
    }

    fn property(&self) -> Option<&str> {
        match self {
            Step::Get { property } | Step::Set { property, .. } | Step::Call { property, .. } => {
                Some(property.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct StepReport {
    index: usize,
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EventReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    property: Option<String>,
    payload: Vec<serde_json::Value>,
}

impl From<&RecordedEvent> for EventReport {
    fn from(event: &RecordedEvent) -> Self {
        Self {
            name: event.name.clone(),
            property: event.property().map(String::from),
            payload: event.payload().iter().map(Value::to_json).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    async_dispatch: bool,
    steps: Vec<StepReport>,
    events: Vec<EventReport>,
    object: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deferred_failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<StatisticsSnapshot>,
}

fn load_script(path: &Path) -> Result<Script> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid script {}", path.display()))
}

fn run_step(
    step: &Step,
    observer: &PropertyObserver,
    target: &Object,
) -> std::result::Result<Option<Value>, String> {
    match step {
        Step::Get { property } => target.get(property).map(Some).map_err(|e| e.to_string()),
        Step::Set { property, value } => target
            .set(property, Value::from(value.clone()))
            .map(|()| None)
            .map_err(|e| e.to_string()),
        Step::Call { property, args } => {
            let args: Vec<Value> = args.iter().cloned().map(Value::from).collect();
            target
                .call(property, &args)
                .map(Some)
                .map_err(|e| e.to_string())
        }
        Step::Enable => {
            observer.context().enable();
            Ok(None)
        }
        Step::Disable => {
            observer.context().disable();
            Ok(None)
        }
        Step::Observe => observer.observe().map(|_| None).map_err(|e| e.to_string()),
        Step::Unobserve => observer.unobserve().map(|_| None).map_err(|e| e.to_string()),
    }
}

/// Execute the run command.
pub fn execute(
    args: RunArgs,
    config: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let mut settings = load_settings(config)?;
    if args.sync {
        settings.async_dispatch = Some(false);
    }
    let target = load_object(&args.object)?;
    let script = load_script(&args.script)?;

    let collector = Arc::new(CollectingListener::default());
    let mut builder = Propwatch::builder()
        .with_isolated_context()
        .with_listener(ALL_EVENTS.join(" "), Callback::from_arc(Arc::clone(&collector)));
    for property in &args.veto {
        builder = builder.with_listener(
            format!("set:before:{property}"),
            Callback::new(|_| Value::Bool(false)),
        );
    }
    let runtime = builder.build();

    let observer = runtime
        .observe_with(target.clone(), settings)
        .context("Failed to observe object")?;

    if !quiet {
        tracing::info!(
            object = %args.object.display(),
            steps = script.steps.len(),
            properties = observer.observed_properties().len(),
            "Running script"
        );
    }

    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let (result, error) = match run_step(step, &observer, &target) {
            Ok(value) => (value.map(|v| v.to_json()), None),
            Err(message) => {
                tracing::warn!(index, op = step.name(), error = %message, "Step failed");
                (None, Some(message))
            }
        };
        steps.push(StepReport {
            index,
            op: step.name(),
            property: step.property().map(String::from),
            result,
            error,
        });
    }

    // Restore plain data properties so the final object can be reported.
    observer.unobserve().context("Failed to restore object")?;
    let deferred_failures: Vec<String> = runtime
        .run_pending()
        .iter()
        .map(ToString::to_string)
        .collect();

    let report = RunReport {
        async_dispatch: observer.is_async(),
        steps,
        events: collector.events().iter().map(EventReport::from).collect(),
        object: Value::Object(target).to_json(),
        deferred_failures,
        statistics: args.stats.then(|| runtime.statistics()),
    };

    match format {
        OutputFormat::Human => print_human(&report, quiet),
        OutputFormat::Json | OutputFormat::JsonCompact => print_json(&report, format)?,
    }
    Ok(())
}

fn print_human(report: &RunReport, quiet: bool) {
    if !quiet {
        let mode = if report.async_dispatch { "async" } else { "sync" };
        println!("Ran {} step(s) ({} dispatch)", report.steps.len(), mode);
    }

    println!("\nSteps:");
    for step in &report.steps {
        let target = step.property.as_deref().unwrap_or("-");
        match (&step.result, &step.error) {
            (_, Some(error)) => println!("  [{}] {} {}: error: {}", step.index, step.op, target, error),
            (Some(result), None) => println!("  [{}] {} {} -> {}", step.index, step.op, target, result),
            (None, None) => println!("  [{}] {} {}", step.index, step.op, target),
        }
    }

    println!("\nEvents:");
    if report.events.is_empty() {
        println!("  (none)");
    }
    for event in &report.events {
        let payload: Vec<String> = event.payload.iter().map(ToString::to_string).collect();
        println!("  {} ({})", event.name, payload.join(", "));
    }

    if !report.deferred_failures.is_empty() {
        println!("\nDeferred listener failures:");
        for failure in &report.deferred_failures {
            println!("  {}", failure);
        }
    }

    println!("\nObject:");
    println!("  {}", report.object);

    if let Some(stats) = &report.statistics {
        println!("\nStatistics:");
        println!("  Triggers: {}", stats.triggers);
        println!("  Failed triggers: {}", stats.failed_triggers);
        for (event, count) in stats.top_events(10) {
            println!("  {:<24} {}", event, count);
        }
    }
}
