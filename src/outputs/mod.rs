//! Report sinks and their wiring from configuration

pub mod json_file;
pub mod json_http;
pub mod log_sink;

use crate::config::SousVideConfig;
use crate::retry::RetryPolicy;
use anyhow::Result;
use tracker::Dispatcher;

pub use json_file::JsonFileSink;
pub use json_http::JsonHttpSink;
pub use log_sink::LogSink;

/// Build the dispatcher for every enabled output, in log, file, http order
pub fn build_dispatcher(config: &SousVideConfig) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();
    let outputs = &config.outputs;

    if outputs.log.enabled {
        dispatcher.add(Box::new(LogSink::new()));
    }

    if let Some(file) = &outputs.file {
        let sink = JsonFileSink::new(file.destination()?);
        log::debug!("Report file: {}", sink.destination().display());
        dispatcher.add(Box::new(sink));
    }

    if let Some(http) = &outputs.http {
        log::debug!("Report endpoint: {}", http.url);
        dispatcher.add(Box::new(JsonHttpSink::new(
            &http.url,
            RetryPolicy::new(http.max_retries, http.retry_delay_secs),
        )));
    }

    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileOutput, HttpOutput};

    #[test]
    fn test_default_config_logs_only() {
        let dispatcher = build_dispatcher(&SousVideConfig::default()).unwrap();
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_all_outputs() {
        let mut config = SousVideConfig::default();
        config.outputs.file = Some(FileOutput {
            directory: Some("/tmp".into()),
            ..Default::default()
        });
        config.outputs.http = Some(HttpOutput {
            url: "http://localhost:9200/sous".into(),
            max_retries: 0,
            retry_delay_secs: 0,
        });

        assert_eq!(build_dispatcher(&config).unwrap().len(), 3);
    }

    #[test]
    fn test_everything_disabled() {
        let mut config = SousVideConfig::default();
        config.outputs.log.enabled = false;
        assert!(build_dispatcher(&config).unwrap().is_empty());
    }
}
