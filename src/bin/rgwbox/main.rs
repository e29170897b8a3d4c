use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace};

use rgwbox_rs::auth::CredentialsProvider;
use rgwbox_rs::config::{Command, Config, DrainConfig};
use rgwbox_rs::curl::{CurlRequest, generate_curl_command};
use rgwbox_rs::storage::create_storage;
use rgwbox_rs::types::error::exit_code_from_error;
use rgwbox_rs::{
    BucketSweeper, CLIArgs, DrainPipeline, SignerV2, create_pipeline_cancellation_token,
    is_cancelled_error,
};

mod ctrl_c_handler;
mod tracing_init;

const EXIT_CODE_WARNING: i32 = 3;

/// rgwbox - Toolbox for Ceph RADOS Gateway.
///
/// This binary is a thin wrapper over the rgwbox-rs library.
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "rgwbox",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    match run(config).await {
        Ok(exit_code) if exit_code != 0 => std::process::exit(exit_code),
        Ok(_) => Ok(()),
        Err(e) => {
            let exit_code = exit_code_from_error(&e);
            if exit_code == 0 {
                debug!("cancelled by user.");
                return Ok(());
            }
            error!("{:#}", e);
            std::process::exit(exit_code);
        }
    }
}

fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

/// Returns the process exit code of a completed command.
async fn run(config: Config) -> Result<i32> {
    let Some(command) = config.command.clone() else {
        CLIArgs::command().print_help()?;
        return Ok(0);
    };

    match command {
        Command::EmptyBucket(drain_config) => empty_bucket(&config, drain_config).await,
        Command::DrainAll {
            name_contains,
            template,
        } => drain_all(&config, &name_contains, template).await,
        Command::Curl(request) => print_curl_command(&config, &request).await,
    }
}

async fn empty_bucket(config: &Config, drain_config: DrainConfig) -> Result<i32> {
    let client = config.client_config.create_client().await?;
    let target = create_storage(client, drain_config.rate_limit_objects);

    let cancellation_token = create_pipeline_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!(bucket = drain_config.bucket, "drain start.");

    let mut pipeline = DrainPipeline::new(drain_config, target, cancellation_token);
    let result = pipeline.run().await;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if let Err(e) = result {
        if is_cancelled_error(&e) {
            debug!("drain cancelled by user.");
            return Ok(0);
        }
        error!(duration_sec = duration_sec, "rgwbox failed.");
        return Err(e);
    }

    debug!(duration_sec = duration_sec, "rgwbox has been completed.");

    Ok(completion_exit_code(config, pipeline.has_warning()))
}

async fn drain_all(config: &Config, name_contains: &str, template: DrainConfig) -> Result<i32> {
    let client = config.client_config.create_client().await?;
    let target = create_storage(client, template.rate_limit_objects);

    let cancellation_token = create_pipeline_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let sweeper = BucketSweeper::new(target, template, cancellation_token);
    sweeper.drain_all_buckets(name_contains).await?;

    Ok(completion_exit_code(config, sweeper.has_warning()))
}

/// Exit code of a drain or sweep that ran to completion.
fn completion_exit_code(config: &Config, has_warning: bool) -> i32 {
    match (has_warning, config.warn_as_error) {
        (false, _) => 0,
        (true, true) => 1,
        (true, false) => EXIT_CODE_WARNING,
    }
}

async fn print_curl_command(config: &Config, request: &CurlRequest) -> Result<i32> {
    let client_config = &config.client_config;
    let credentials = CredentialsProvider::from_config(
        &client_config.credential,
        &client_config.client_config_location,
    )
    .await?;
    let signer = SignerV2::new(credentials, client_config.debug_signing);

    println!("{}", generate_curl_command(&signer, request).await?);
    Ok(0)
}
