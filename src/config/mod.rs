pub mod args;

use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::auth::{CredentialsProvider, SignerV2};
use crate::client::StorageClient;
use crate::curl::CurlRequest;
use crate::types::error::RgwboxError;
use crate::types::{ClientConfigLocation, S3Credentials};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_WORKER_SIZE: u16 = 3;
pub const DEFAULT_QUEUE_SIZE: u32 = 1000;
pub const DEFAULT_BATCH_SIZE: u16 = 1000;
pub const DEFAULT_MAX_KEYS: i32 = 1000;
/// DeleteObjects accepts at most this many keys per request.
pub const MAX_BATCH_SIZE: u16 = 1000;

/// Top-level configuration assembled from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_config: ClientConfig,
    pub tracing_config: Option<TracingConfig>,
    pub command: Option<Command>,
    /// Exit with 1 instead of 3 when a drain completes with warnings.
    pub warn_as_error: bool,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Drain one bucket.
    EmptyBucket(DrainConfig),
    /// Drain every bucket whose name contains `name_contains`, using
    /// `template` for everything but the bucket name.
    DrainAll {
        name_contains: String,
        template: DrainConfig,
    },
    /// Print a signed curl command line.
    Curl(CurlRequest),
}

/// Parameters of one bucket drain.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainConfig {
    pub bucket: String,
    /// Number of concurrent delete workers.
    pub worker_size: u16,
    /// Capacity of the work channel between the lister and the workers.
    pub queue_size: u32,
    /// 0 deletes objects one at a time; otherwise the maximum number of
    /// objects per DeleteObjects request (clamped to 1000).
    pub batch_size: u16,
    pub delete_bucket_after: bool,
    /// Page size of version listings.
    pub max_keys: i32,
    /// Objects per second across all workers.
    pub rate_limit_objects: Option<u32>,
    pub show_no_progress: bool,
}

impl DrainConfig {
    /// The configuration used when sweeping buckets.
    pub fn for_bucket(bucket: &str) -> Self {
        DrainConfig {
            bucket: bucket.to_string(),
            ..DrainConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_size == 0 {
            return Err(anyhow!(RgwboxError::InvalidConfig(
                "worker_size must be at least 1".to_string()
            )));
        }
        if self.queue_size == 0 {
            return Err(anyhow!(RgwboxError::InvalidConfig(
                "queue_size must be at least 1".to_string()
            )));
        }
        if !(1..=1000).contains(&self.max_keys) {
            return Err(anyhow!(RgwboxError::InvalidConfig(format!(
                "max_keys must be between 1 and 1000: {}",
                self.max_keys
            ))));
        }
        Ok(())
    }

    /// Objects per DeleteObjects request, or `None` in per-object mode.
    pub fn effective_batch_size(&self) -> Option<usize> {
        match self.batch_size {
            0 => None,
            size => Some(size.min(MAX_BATCH_SIZE) as usize),
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        DrainConfig {
            bucket: String::new(),
            worker_size: DEFAULT_WORKER_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            delete_bucket_after: true,
            max_keys: DEFAULT_MAX_KEYS,
            rate_limit_objects: None,
            show_no_progress: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub endpoint_url: String,
    /// Only used for SigV4 POST policies.
    pub region: String,
    pub debug_signing: bool,
    pub cli_timeout_config: CLITimeoutConfig,
}

impl ClientConfig {
    /// Build the signed HTTP client for this configuration.
    pub async fn create_client(&self) -> Result<StorageClient> {
        let credentials =
            CredentialsProvider::from_config(&self.credential, &self.client_config_location)
                .await?;
        let signer = SignerV2::new(credentials, self.debug_signing);

        let mut builder = reqwest::Client::builder();
        if let Some(connect_timeout) = self.cli_timeout_config.connect_timeout_milliseconds {
            builder = builder.connect_timeout(Duration::from_millis(connect_timeout));
        }
        if let Some(operation_timeout) = self.cli_timeout_config.operation_timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(operation_timeout));
        }
        let http = builder.build().context("reqwest::ClientBuilder::build() failed.")?;

        Ok(StorageClient::new(&self.endpoint_url, signer, http))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub http_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
