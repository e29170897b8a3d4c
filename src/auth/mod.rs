//! Credentials and request signing.
//!
//! Every request sent to the gateway is signed with AWS Signature Version 2
//! ([`sigv2`]). Signature Version 4 ([`sigv4`]) is only used to sign browser
//! POST upload policies.

use std::fmt;

use anyhow::{Result, anyhow};
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use tracing::debug;

use crate::types::error::RgwboxError;
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials};

pub mod sigv2;
pub mod sigv4;

pub use sigv2::{SignerV2, SigningOutput};

/// Source of the access keys used to sign requests.
#[derive(Clone)]
pub enum CredentialsProvider {
    Static(AccessKeys),
    Provider(SharedCredentialsProvider),
}

impl fmt::Debug for CredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(keys) => f.debug_tuple("Static").field(keys).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl CredentialsProvider {
    /// Build a provider from the configured credential source.
    pub async fn from_config(
        credential: &S3Credentials,
        location: &ClientConfigLocation,
    ) -> Result<Self> {
        match credential {
            S3Credentials::Credentials { access_keys } => Ok(Self::Static(access_keys.clone())),
            S3Credentials::Profile(profile_name) => {
                debug!(profile_name, "loading credentials from profile.");

                let mut builder =
                    ProfileFileCredentialsProvider::builder().profile_name(profile_name);
                if let Some(profile_files) = build_profile_files(location) {
                    builder = builder.profile_files(profile_files);
                }
                Ok(Self::Provider(SharedCredentialsProvider::new(
                    builder.build(),
                )))
            }
            S3Credentials::FromEnvironment => {
                debug!("loading credentials from the default provider chain.");

                let chain = DefaultCredentialsChain::builder().build().await;
                Ok(Self::Provider(SharedCredentialsProvider::new(chain)))
            }
        }
    }

    /// Resolve the current access keys.
    ///
    /// Empty access or secret keys are rejected.
    pub async fn credentials(&self) -> Result<AccessKeys> {
        let keys = match self {
            Self::Static(keys) => keys.clone(),
            Self::Provider(provider) => {
                let credentials = provider.provide_credentials().await.map_err(|e| {
                    anyhow!(RgwboxError::Credential(format!(
                        "failed to load credentials: {e}"
                    )))
                })?;
                AccessKeys {
                    access_key: credentials.access_key_id().to_string(),
                    secret_access_key: credentials.secret_access_key().to_string(),
                    session_token: credentials.session_token().map(|t| t.to_string()),
                }
            }
        };

        if keys.access_key.is_empty() || keys.secret_access_key.is_empty() {
            return Err(anyhow!(RgwboxError::Credential(
                "access key and secret key must not be empty".to_string()
            )));
        }

        Ok(keys)
    }
}

fn build_profile_files(location: &ClientConfigLocation) -> Option<EnvConfigFiles> {
    if location.aws_config_file.is_none() && location.aws_shared_credentials_file.is_none() {
        return None;
    }

    let mut builder = EnvConfigFiles::builder();
    builder = match &location.aws_config_file {
        Some(path) => builder.with_file(EnvConfigFileKind::Config, path),
        None => builder.include_default_config_file(true),
    };
    builder = match &location.aws_shared_credentials_file {
        Some(path) => builder.with_file(EnvConfigFileKind::Credentials, path),
        None => builder.include_default_credentials_file(true),
    };

    Some(builder.build())
}
