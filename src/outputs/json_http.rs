//! Posts every resource to an HTTP endpoint
//!
//! One POST per resource with the flat resource object plus an
//! `@timestamp` field, which is what Logstash and Elasticsearch expect.

use crate::retry::{RetryPolicy, with_retry};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, SecondsFormat, TimeZone};
use serde_json::Value;
use tracker::{NodeData, ReportSink, RunData, TrackedResource, merged};

pub struct JsonHttpSink {
    agent: ureq::Agent,
    url: String,
    retry: RetryPolicy,
}

impl JsonHttpSink {
    pub fn new(url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            url: url.into(),
            retry,
        }
    }

    fn post(&self, payload: &Value) -> Result<(), ureq::Error> {
        self.agent
            .post(&self.url)
            .header("Content-Type", "application/json")
            .send_json(payload)?;
        Ok(())
    }
}

impl ReportSink for JsonHttpSink {
    fn name(&self) -> &str {
        "http"
    }

    fn deliver(&self, run: &RunData, node: &NodeData, resources: &[TrackedResource]) -> Result<()> {
        log::info!("Processing {} resources.", resources.len());
        log::info!("Target: {}", self.url);

        for tracked in resources {
            let mut payload = merged(tracked, node, run);
            payload.insert(
                "@timestamp".to_string(),
                Value::from(event_timestamp(tracked.started_at.as_deref())),
            );
            let payload = Value::Object(payload);

            with_retry(&self.retry, &format!("POST {tracked}"), || self.post(&payload))
                .with_context(|| format!("Could not post {tracked} to {}", self.url))?;
        }

        log::info!("All resources processed.");
        Ok(())
    }
}

/// ISO-8601 timestamp with milliseconds for a record start time
///
/// Start times are local wall-clock times; unparsable or missing values
/// fall back to now.
pub fn event_timestamp(started_at: Option<&str>) -> String {
    started_at
        .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .unwrap_or_else(Local::now)
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}
