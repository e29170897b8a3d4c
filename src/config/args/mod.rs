use crate::config::{
    CLITimeoutConfig, ClientConfig, Command, Config, DEFAULT_BATCH_SIZE, DEFAULT_MAX_KEYS,
    DEFAULT_QUEUE_SIZE, DEFAULT_REGION, DEFAULT_WORKER_SIZE, DrainConfig, TracingConfig,
};
use crate::curl::{BodyType, CurlRequest};
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials};
use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;

pub mod value_parser;


const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_WARN_AS_ERROR: bool = false;
const DEFAULT_DEBUG_SIGNING: bool = false;
const DEFAULT_KEEP_BUCKET: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;

const ERROR_MESSAGE_ENDPOINT_REQUIRED: &str = "--endpoint-url is required.";
const ERROR_MESSAGE_SECRET_KEY_REQUIRED: &str =
    "--secret-key is required when --access-key is given.";
const ERROR_MESSAGE_BUCKET_EMPTY: &str = "Bucket name must not be empty.";

/// rgwbox - Toolbox for Ceph RADOS Gateway.
///
/// Drain and delete buckets, and print V2-signed curl commands.
///
/// Example:
///   rgwbox --endpoint-url http://rgw:7480 empty-bucket my-bucket
///   rgwbox --endpoint-url http://rgw:7480 drain-all --name-contains tmp- -v
///   rgwbox --endpoint-url http://rgw:7480 curl GET 'http://rgw:7480/b?versioning'
#[derive(Parser, Clone, Debug)]
#[command(name = "rgwbox", version, about, long_about = None)]
pub struct CLIArgs {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Gateway endpoint, e.g. http://rgw:7480
    #[arg(long, env, global = true, value_parser = value_parser::url::check_scheme, help_heading = "Gateway")]
    pub endpoint_url: Option<String>,

    /// Region used in SigV4 POST policies.
    #[arg(long, env, global = true, default_value = DEFAULT_REGION, value_parser = NonEmptyStringValueParser::new(), help_heading = "Gateway")]
    pub region: String,

    /// Log the V2 string-to-sign and signature of every request.
    #[arg(long, env, global = true, default_value_t = DEFAULT_DEBUG_SIGNING, help_heading = "Gateway")]
    pub debug_signing: bool,

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------
    /// AWS config file path.
    #[arg(long, env, global = true, help_heading = "Credentials")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, global = true, help_heading = "Credentials")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// Profile to read credentials from.
    #[arg(long, env, global = true, conflicts_with = "access_key", value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub profile: Option<String>,

    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub access_key: Option<String>,

    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub secret_key: Option<String>,

    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub session_token: Option<String>,

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, global = true, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Also trace the HTTP client.
    #[arg(long, env, global = true, default_value_t = DEFAULT_HTTP_TRACING, help_heading = "Logging")]
    pub http_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, global = true, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Timeout
    // -----------------------------------------------------------------------
    /// Whole request timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // Advanced
    // -----------------------------------------------------------------------
    /// Treat warnings as errors (exit code 1 instead of 3).
    #[arg(long, env, global = true, default_value_t = DEFAULT_WARN_AS_ERROR, help_heading = "Advanced")]
    pub warn_as_error: bool,

    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Delete every object version and multipart upload of a bucket, then
    /// the bucket itself.
    EmptyBucket {
        #[arg(value_parser = NonEmptyStringValueParser::new())]
        bucket: String,

        #[command(flatten)]
        drain: DrainArgs,
    },

    /// Drain every bucket whose name contains a substring.
    DrainAll {
        /// Substring to match. Empty matches every bucket.
        #[arg(long, env, default_value = "")]
        name_contains: String,

        #[command(flatten)]
        drain: DrainArgs,
    },

    /// Print a V2-signed curl command line.
    Curl {
        /// HEAD, GET, PUT, POST or DELETE.
        method: String,

        /// Full request URL, path style.
        #[arg(value_parser = value_parser::url::check_scheme)]
        url: String,

        /// Request body, PUT and POST only.
        #[arg(long)]
        body: Option<String>,

        #[arg(long, value_enum)]
        body_type: Option<CurlBodyType>,

        #[arg(long)]
        content_md5: Option<String>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct DrainArgs {
    /// Number of concurrent delete workers.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, value_parser = clap::value_parser!(u16).range(1..), help_heading = "Drain")]
    pub worker_size: u16,

    /// Capacity of the queue between the lister and the workers.
    #[arg(long, env, default_value_t = DEFAULT_QUEUE_SIZE, value_parser = clap::value_parser!(u32).range(1..), help_heading = "Drain")]
    pub queue_size: u32,

    /// Objects per DeleteObjects request (at most 1000). 0 deletes one
    /// object per request.
    #[arg(long, env, default_value_t = DEFAULT_BATCH_SIZE, help_heading = "Drain")]
    pub batch_size: u16,

    /// Leave the emptied bucket in place.
    #[arg(long, env, default_value_t = DEFAULT_KEEP_BUCKET, help_heading = "Drain")]
    pub keep_bucket: bool,

    /// Versions per listing request.
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS, value_parser = clap::value_parser!(i32).range(1..=1000), help_heading = "Drain")]
    pub max_keys: i32,

    /// Maximum objects deleted per second across all workers.
    #[arg(long, env, value_parser = clap::value_parser!(u32).range(1..), help_heading = "Drain")]
    pub rate_limit_objects: Option<u32>,

    /// Don't log progress every second.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "Drain")]
    pub show_no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurlBodyType {
    Json,
    Xml,
}

impl From<CurlBodyType> for BodyType {
    fn from(value: CurlBodyType) -> Self {
        match value {
            CurlBodyType::Json => BodyType::Json,
            CurlBodyType::Xml => BodyType::Xml,
        }
    }
}

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use rgwbox_rs::config::args::parse_from_args;
///
/// let args = vec!["rgwbox", "--endpoint-url", "http://rgw:7480", "empty-bucket", "b1"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.endpoint_url.as_deref(), Some("http://rgw:7480"));
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

impl DrainArgs {
    fn build_drain_config(&self, bucket: &str) -> DrainConfig {
        DrainConfig {
            bucket: bucket.to_string(),
            worker_size: self.worker_size,
            queue_size: self.queue_size,
            batch_size: self.batch_size,
            delete_bucket_after: !self.keep_bucket,
            max_keys: self.max_keys,
            rate_limit_objects: self.rate_limit_objects,
            show_no_progress: self.show_no_progress,
        }
    }
}

impl CLIArgs {
    fn build_client_config(&self) -> Result<ClientConfig, String> {
        let credential = if let Some(ref profile) = self.profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.access_key {
            let secret_key = self
                .secret_key
                .as_deref()
                .ok_or_else(|| ERROR_MESSAGE_SECRET_KEY_REQUIRED.to_string())?;
            let mut access_keys = AccessKeys::new(access_key.as_str(), secret_key);
            access_keys.session_token = self.session_token.clone();
            S3Credentials::Credentials { access_keys }
        } else {
            S3Credentials::FromEnvironment
        };

        Ok(ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            endpoint_url: self.endpoint_url.clone().unwrap_or_default(),
            region: self.region.clone(),
            debug_signing: self.debug_signing,
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
            },
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            http_tracing: self.http_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    fn build_command(&self) -> Result<Option<Command>, String> {
        let command = match &self.command {
            None => return Ok(None),
            Some(Commands::EmptyBucket { bucket, drain }) => {
                if bucket.trim().is_empty() {
                    return Err(ERROR_MESSAGE_BUCKET_EMPTY.to_string());
                }
                Command::EmptyBucket(drain.build_drain_config(bucket))
            }
            Some(Commands::DrainAll {
                name_contains,
                drain,
            }) => Command::DrainAll {
                name_contains: name_contains.clone(),
                template: drain.build_drain_config(""),
            },
            Some(Commands::Curl {
                method,
                url,
                body,
                body_type,
                content_md5,
            }) => Command::Curl(CurlRequest {
                method: method.to_ascii_uppercase(),
                url: url.clone(),
                body: body.clone(),
                body_type: body_type.map(BodyType::from).unwrap_or_default(),
                content_md5: content_md5.clone(),
            }),
        };

        Ok(Some(command))
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        let command = args.build_command()?;

        // Curl only renders a URL it was given; the drains talk to the endpoint.
        let needs_endpoint = matches!(
            command,
            Some(Command::EmptyBucket(_)) | Some(Command::DrainAll { .. })
        );
        if needs_endpoint && args.endpoint_url.is_none() {
            return Err(ERROR_MESSAGE_ENDPOINT_REQUIRED.to_string());
        }

        Ok(Config {
            client_config: args.build_client_config()?,
            tracing_config: args.build_tracing_config(),
            command,
            warn_as_error: args.warn_as_error,
            auto_complete_shell: args.auto_complete_shell,
        })
    }
}
