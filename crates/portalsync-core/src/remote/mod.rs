//! Remote transport
//!
//! The Dataverse Web API implementation of [`crate::gateway::RemoteGateway`]
//! and the token providers it authenticates with.

mod auth;
mod dataverse;

pub use auth::{scope_for, ClientCredentials, StaticToken};
pub use dataverse::{quote, DataverseGateway, ODataQuery};

use std::sync::Arc;

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::gateway::TokenProvider;

/// Pick a token provider for a configuration
///
/// A static access token wins over client credentials.
pub fn token_provider(config: &Config) -> SyncResult<Arc<dyn TokenProvider>> {
    if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Arc::new(StaticToken::new(token)));
    }

    let instance_url = config.instance_url().ok_or_else(|| {
        SyncError::Configuration("instance_name and crm_region must be set".to_string())
    })?;

    match (
        config.tenant_id.as_deref(),
        config.client_id.as_deref(),
        config.client_secret.as_deref(),
    ) {
        (Some(tenant), Some(client), Some(secret))
            if !tenant.is_empty() && !client.is_empty() && !secret.is_empty() =>
        {
            let provider = ClientCredentials::new(
                tenant,
                client,
                secret,
                &instance_url,
                config.request_timeout(),
            )
            .map_err(|e| SyncError::Configuration(e.to_string()))?;
            Ok(Arc::new(provider))
        }
        _ => Err(SyncError::Configuration(
            "set access_token, or tenant_id, client_id and client_secret".to_string(),
        )),
    }
}

/// Build the Dataverse gateway for a configuration
///
/// Fails before any remote call when the configuration is incomplete.
pub fn connect(config: &Config) -> SyncResult<DataverseGateway> {
    let instance_url = config.instance_url().ok_or_else(|| {
        SyncError::Configuration("instance_name and crm_region must be set".to_string())
    })?;
    let tokens = token_provider(config)?;
    DataverseGateway::new(&instance_url, tokens, config.request_timeout()).map_err(SyncError::from)
}
