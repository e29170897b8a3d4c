/*!
# Overview
rgwbox-rs is a toolbox for Ceph RADOS Gateway, built around a fast
concurrent bucket drain.

## Features
- **Bucket drain**: lists every object version and delete marker, aborts
  in-progress multipart uploads, deletes everything with a pool of workers
  (DeleteObjects batches of up to 1000 keys, or one request per object), then
  deletes the bucket
- **Bucket sweep**: drains every bucket whose name contains a substring
- **AWS Signature Version 2**: header-based signing, as still accepted by
  RADOS Gateway
- **Gateway extensions**: appendable objects, pubsub topics and bucket
  notifications, and the admin REST API (users, keys, caps, quotas)
- **Helpers**: V2-signed `curl` command lines and SigV4 browser POST policies

## As a Library
The rgwbox CLI is a thin wrapper over this library.

Example usage
=============

```toml
[dependencies]
rgwbox-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use rgwbox_rs::config::args::build_config_from_args;
use rgwbox_rs::config::Command;
use rgwbox_rs::storage::create_storage;
use rgwbox_rs::{DrainPipeline, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = build_config_from_args([
        "rgwbox",
        "--endpoint-url",
        "http://rgw:7480",
        "empty-bucket",
        "my-bucket",
    ])
    .map_err(anyhow::Error::msg)?;

    let Some(Command::EmptyBucket(drain_config)) = config.command else {
        return Ok(());
    };

    let client = config.client_config.create_client().await?;
    let target = create_storage(client, drain_config.rate_limit_objects);

    let mut pipeline =
        DrainPipeline::new(drain_config, target, create_pipeline_cancellation_token());
    pipeline.run().await?;

    println!("{:?}", pipeline.get_drain_stats());
    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod aborter;
pub mod auth;
pub mod client;
pub mod config;
pub mod curl;
pub mod deleter;
pub mod lister;
pub mod pipeline;
pub mod post_object;
pub mod reporter;
pub mod rgw;
pub mod stage;
pub mod storage;
pub mod sweep;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use auth::SignerV2;
pub use client::StorageClient;
pub use config::Config;
pub use config::DrainConfig;
pub use config::args::CLIArgs;
pub use pipeline::{DrainPipeline, DrainState, empty_bucket};
pub use rgw::RgwClient;
pub use sweep::{BucketSweeper, drain_all_buckets};
pub use types::error::{RgwboxError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
