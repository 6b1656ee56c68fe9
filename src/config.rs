use serde::Deserialize;

use crate::constants::{
    DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_IN_FLIGHT_LIMIT,
    DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT, DEFAULT_WRITE_QUEUE_DEPTH,
};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub app_name: Option<String>,
    /// Per-connection pipeline tuning
    pub pipeline: Option<PipelineConfig>,
    /// Wire framing selection (tables under [framing])
    pub framing: Option<FramingConfig>,
    /// Logging / events configuration
    pub logging: Option<LoggingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            app_name: None,
            pipeline: Some(PipelineConfig::default()),
            framing: Some(FramingConfig::default()),
            logging: None,
        }
    }
}

impl Config {
    /// Parse a TOML document into a Config. The embedding application decides
    /// where the document comes from (file, env, literal).
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        self.pipeline.clone().unwrap_or_default()
    }

    pub fn framing(&self) -> FramingConfig {
        self.framing.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineConfig {
    /// Maximum concurrently dispatching requests per connection (minimum 1)
    pub in_flight_limit: Option<usize>,
    /// Seconds to wait for outstanding dispatches before cancelling on drain
    pub drain_timeout_secs: Option<u64>,
    /// Seconds of silence before an idle connection is drained (0 disables)
    pub idle_timeout_secs: Option<u64>,
    /// Depth of the bounded outbound envelope queue
    pub write_queue_depth: Option<usize>,
}

impl PipelineConfig {
    pub fn in_flight_limit(&self) -> usize {
        self.in_flight_limit.unwrap_or(DEFAULT_IN_FLIGHT_LIMIT).max(1)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs.unwrap_or(DEFAULT_DRAIN_TIMEOUT_SECS))
    }

    /// None means the idle monitor is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
        }
    }

    pub fn write_queue_depth(&self) -> usize {
        self.write_queue_depth.unwrap_or(DEFAULT_WRITE_QUEUE_DEPTH).max(1)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FramingConfig {
    /// kind: line | delimiter | length-prefixed (default line)
    pub kind: Option<String>,
    /// Single ASCII delimiter character, only read for kind = "delimiter"
    pub delimiter: Option<String>,
    /// Upper bound for a single frame, only read for kind = "length-prefixed"
    pub max_frame_bytes: Option<usize>,
}

impl FramingConfig {
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Path to JSON line event log (rotated). If unset, defaults to logs/events.jsonl
    pub json_path: Option<String>,
    /// Max size in bytes before rotation (default 5MB)
    pub json_max_bytes: Option<usize>,
    /// Number of rotated files to retain (default 3)
    pub json_rotate: Option<u32>,
    /// Disable console sink (default false)
    pub disable_console: Option<bool>,
}
