//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::Settings;
use crate::engine::{ResourceOutcome, SyncEngine};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RateLimiter};
use crate::pagination::PageFetcher;
use crate::sink::JsonlSink;
use crate::state::{ObjectKvStore, WatermarkStore};
use crate::types::{format_query_timestamp, format_watermark, parse_timestamp};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                resources,
                start_date,
                destination,
            } => {
                self.sync(
                    resources.as_deref(),
                    start_date.as_deref(),
                    destination.as_deref(),
                )
                .await
            }
            Commands::Resources => self.resources(),
            Commands::Watermark { resource } => self.watermark(resource).await,
            Commands::Validate => self.validate(),
        }
    }

    fn load_settings(&self) -> Result<Settings> {
        Settings::from_file(&self.cli.config)
    }

    /// Sync the selected resources and report one line per resource
    async fn sync(
        &self,
        resources: Option<&str>,
        start_date: Option<&str>,
        destination: Option<&str>,
    ) -> Result<()> {
        let mut settings = self.load_settings()?;
        if let Some(start_date) = start_date {
            parse_timestamp(start_date)
                .map_err(|e| Error::invalid_value("--start-date", e.to_string()))?;
            settings.start_date = start_date.to_string();
        }
        if let Some(destination) = destination {
            settings.destination = destination.to_string();
        }

        let registry = Arc::new(settings.registry()?);
        let selected = match resources {
            Some(list) => parse_resource_list(list),
            None => settings.selected_resources(&registry),
        };
        if selected.is_empty() {
            return Err(Error::config("No resources selected"));
        }

        let engine = build_engine(&settings, registry)?;

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received shutdown signal (Ctrl+C), cancelling uncommitted runs");
                on_signal.cancel();
            }
        });

        info!(resources = ?selected, "starting sync");
        let outcomes = engine.sync_all(&selected, &cancel).await;

        for outcome in &outcomes {
            self.output_message(&outcome_message(outcome));
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            return Err(Error::Other(format!(
                "{failed} of {} resource(s) failed",
                outcomes.len()
            )));
        }
        Ok(())
    }

    /// List registered resources
    fn resources(&self) -> Result<()> {
        let settings = self.load_settings()?;
        let registry = settings.registry()?;

        let resources: Vec<Value> = registry
            .iter()
            .map(|definition| {
                json!({
                    "name": definition.name,
                    "endpoint": definition.endpoint(),
                    "primary_key": definition.primary_key,
                    "cursor_field": definition.cursor_field,
                    "write_mode": definition.write_mode,
                    "fields": definition.fields,
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "RESOURCES",
            "resources": resources
        }));
        Ok(())
    }

    /// Show the stored watermark of a resource
    async fn watermark(&self, resource: &str) -> Result<()> {
        let settings = self.load_settings()?;
        settings.registry()?.get(resource)?;

        let watermarks = build_watermark_store(&settings)?;
        let watermark = watermarks.load(resource).await?;

        self.output_message(&json!({
            "type": "WATERMARK",
            "resource": resource,
            "key": watermarks.key_for(resource),
            "watermark": watermark,
        }));
        Ok(())
    }

    /// Validate the settings file
    fn validate(&self) -> Result<()> {
        let settings = self.load_settings()?;
        let registry = settings.registry()?;

        self.output_message(&json!({
            "type": "VALIDATION",
            "status": "valid",
            "base_url": settings.base_url()?,
            "resources": settings.selected_resources(&registry),
        }));
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Wire the engine from settings: one shared rate limiter, one client
pub fn build_engine(
    settings: &Settings,
    registry: Arc<crate::registry::ResourceRegistry>,
) -> Result<SyncEngine> {
    let limiter = Arc::new(RateLimiter::new(&settings.rate_limit));
    let client = HttpClient::new(settings.http_client_config(), limiter)?;
    let fetcher = PageFetcher::new(Arc::new(client), settings.base_url()?);
    let watermarks = build_watermark_store(settings)?;
    let sink = JsonlSink::from_url(&settings.destination)?;

    Ok(SyncEngine::new(
        fetcher,
        watermarks,
        Arc::new(sink),
        registry,
        settings.sync_config()?,
    ))
}

fn build_watermark_store(settings: &Settings) -> Result<WatermarkStore> {
    let store = ObjectKvStore::from_url(&settings.store.url)?;
    Ok(WatermarkStore::new(Arc::new(store))
        .with_namespace(settings.store.namespace.clone())
        .with_retry(settings.store_retry()))
}

fn parse_resource_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn outcome_message(outcome: &ResourceOutcome) -> Value {
    match &outcome.result {
        Ok(report) => json!({
            "type": "RESULT",
            "resource": outcome.resource,
            "status": "committed",
            "window": {
                "lower_bound": format_query_timestamp(&report.window.lower_bound),
                "upper_bound": format_query_timestamp(&report.window.upper_bound),
            },
            "pages": report.pages,
            "records": report.records,
            "watermark": format_watermark(&report.watermark.last_value),
            "duration_ms": report.duration_ms,
        }),
        Err(e) => json!({
            "type": "RESULT",
            "resource": outcome.resource,
            "status": "failed",
            "kind": e.kind().to_string(),
            "http_status": e.status(),
            "error": e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SyncReport, SyncWindow};
    use crate::registry::ResourceDefinition;
    use crate::state::Watermark;

    #[test]
    fn test_parse_resource_list() {
        assert_eq!(
            parse_resource_list(" orders, ,customers "),
            vec!["orders".to_string(), "customers".to_string()]
        );
        assert!(parse_resource_list("").is_empty());
    }

    #[test]
    fn test_outcome_message_failed() {
        let outcome = ResourceOutcome {
            resource: "orders".to_string(),
            result: Err(Error::http_status(429, "orders", "Exceeded 2 calls per second")),
        };
        let msg = outcome_message(&outcome);
        assert_eq!(msg["status"], "failed");
        assert_eq!(msg["kind"], "upstream-rejected");
        assert_eq!(msg["http_status"], 429);
    }

    #[test]
    fn test_outcome_message_committed() {
        let lower = parse_timestamp("2023-01-01").unwrap();
        let upper = parse_timestamp("2023-06-01 12:00:00").unwrap();
        let window = SyncWindow::new(&ResourceDefinition::new("orders"), lower, upper).unwrap();
        let outcome = ResourceOutcome {
            resource: "orders".to_string(),
            result: Ok(SyncReport {
                resource: "orders".to_string(),
                window,
                pages: 2,
                records: 4,
                watermark: Watermark::first(lower, upper, upper),
                duration_ms: 5,
            }),
        };

        let msg = outcome_message(&outcome);
        assert_eq!(msg["status"], "committed");
        assert_eq!(msg["records"], 4);
        assert_eq!(msg["watermark"], "2023-06-01 12:00:00");
        assert_eq!(msg["window"]["lower_bound"], "2023-01-01T00:00:00+00:00");
    }
}
