use std::num::NonZeroU64;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use tracing::Level;

use crate::submitter::Options;
use crate::transport::Headers;

#[derive(Envconfig, Clone)]
pub struct Config {
    pub home_doc_url: String,

    #[envconfig(default = "0")]
    pub buffer_size: usize,

    pub buffer_flush_seconds: Option<NonZeroU64>,

    #[envconfig(default = "false")]
    pub gzip: bool,

    #[envconfig(default = "false")]
    pub print_sink: bool,

    #[envconfig(default = "5000")]
    pub request_timeout_ms: EnvMsDuration,

    #[envconfig(nested = true)]
    pub trace: TraceConfig,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "sec-client")]
    pub otel_service_name: String,

    #[envconfig(default = "info")]
    pub log_level: Level,
}

/// Values sent as `x-vf-trace-*` headers on every request.
#[derive(Envconfig, Clone, Default)]
pub struct TraceConfig {
    #[envconfig(from = "TRACE_SOURCE")]
    pub source: Option<String>,

    #[envconfig(from = "TRACE_SOURCE_VERSION")]
    pub source_version: Option<String>,

    #[envconfig(from = "TRACE_SUBJECT_ID")]
    pub subject_id: Option<String>,

    #[envconfig(from = "TRACE_SUBJECT_REGION")]
    pub subject_region: Option<String>,
}

impl Config {
    pub fn options(&self) -> Options {
        Options {
            buffer_size: self.buffer_size,
            buffer_flush_seconds: self.buffer_flush_seconds,
            gzip_compressor: self.gzip,
        }
    }

    pub fn metadata(&self) -> Headers {
        self.trace.headers()
    }
}

impl TraceConfig {
    pub fn headers(&self) -> Headers {
        [
            ("x-vf-trace-source", &self.source),
            ("x-vf-trace-source-version", &self.source_version),
            ("x-vf-trace-subject-id", &self.subject_id),
            ("x-vf-trace-subject-region", &self.subject_region),
        ]
        .into_iter()
        .filter_map(|(name, value)| Some((name.to_owned(), value.clone()?)))
        .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
