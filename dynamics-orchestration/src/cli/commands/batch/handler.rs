//! Batch planning handler

use anyhow::{Context, Result};
use colored::*;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;

use super::{BatchCommands, OutputFormat};
use crate::api::{BatchPlanCollection, OrchestrationConfig, RequestInformation, RequestStep};

/// One entry of the request file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequestEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl BatchRequestEntry {
    pub fn to_request(&self) -> Result<RequestInformation> {
        let method = reqwest::Method::from_bytes(self.method.to_uppercase().as_bytes())
            .with_context(|| format!("Invalid HTTP method: {}", self.method))?;

        let mut request = RequestInformation::new(method, self.url.clone());
        for (name, value) in &self.headers {
            request.set_header(name.clone(), value.clone());
        }
        if let Some(body) = &self.body {
            request = request.with_json_body(body)?;
        }
        Ok(request)
    }
}

/// Partition the requests into a finalized collection
pub fn build_collection(entries: &[BatchRequestEntry], max_steps: usize) -> Result<BatchPlanCollection> {
    let mut collection = BatchPlanCollection::with_capacity(max_steps)?;

    for (idx, entry) in entries.iter().enumerate() {
        let request = entry
            .to_request()
            .with_context(|| format!("Request #{} is invalid", idx + 1))?;

        match &entry.id {
            Some(id) => {
                let step = RequestStep::new(id.clone(), request)?.with_dependencies(entry.depends_on.clone());
                if !collection.add_step(step)? {
                    log::warn!("Skipping duplicate step id '{}'", id);
                }
            }
            None => {
                let id = collection.add_request(request)?;
                log::debug!("Request #{} assigned id {}", idx + 1, id);
            }
        }
    }

    collection.finalize_for_execution();
    Ok(collection)
}

/// Wire payloads of every plan, in execution order
pub fn render_payloads(collection: &BatchPlanCollection, format: OutputFormat) -> Result<String> {
    let payloads = collection
        .plans()
        .into_iter()
        .map(|plan| plan.to_json())
        .collect::<crate::Result<Vec<Value>>>()?;

    let payloads = Value::Array(payloads);
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&payloads).context("Failed to format JSON output"),
        OutputFormat::JsonCompact => serde_json::to_string(&payloads).context("Failed to format JSON output"),
    }
}

pub fn handle_plan_batch_command(args: BatchCommands, config: &OrchestrationConfig) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("Request file does not exist: {}", args.file.display());
    }

    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read request file: {}", args.file.display()))?;
    let entries: Vec<BatchRequestEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Request file must hold a JSON array of requests: {}", args.file.display()))?;

    let max_steps = args.max_steps.unwrap_or(config.batch.max_steps_per_plan);
    let collection = build_collection(&entries, max_steps)?;

    eprintln!(
        "{} {} requests into {} plans of at most {} steps",
        "Planned".bright_green().bold(),
        collection.len(),
        collection.plans().len(),
        max_steps
    );
    println!("{}", render_payloads(&collection, args.format)?);
    Ok(())
}
