// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Off-chain patient profile storage

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::ProfileStoreConfig;
use crate::types::Address;

/// Errors from the profile store
#[derive(Debug, Clone, Error)]
pub enum ProfileStoreError {
    #[error("Profile store unavailable: {0}")]
    Unavailable(String),

    #[error("Profile store rejected the request: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Profile details collected from the user at onboarding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
}

impl PatientProfile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            date_of_birth: None,
        }
    }
}

/// What is written to the off-chain store once a DID is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// Signing account the profile belongs to
    pub account: Address,
    /// DID registered for the account
    pub did: Address,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    /// Guardian account, for dependents
    pub guardian: Option<Address>,
    pub is_dependent: bool,
    pub updated_at: DateTime<Utc>,
}

/// Structured store holding the off-chain side of a profile
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get the name of this store
    fn name(&self) -> &str;

    /// Create or replace the profile for `update.account`
    async fn save_profile(&self, update: &ProfileUpdate) -> Result<(), ProfileStoreError>;

    async fn load_profile(&self, account: &Address) -> Result<Option<ProfileUpdate>, ProfileStoreError>;
}

/// In-memory store, for tests and the simulated CLI mode
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<Address, ProfileUpdate>>>,
    /// Whether writes should fail, for exercising failure paths
    unavailable: Arc<RwLock<bool>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn save_profile(&self, update: &ProfileUpdate) -> Result<(), ProfileStoreError> {
        if *self.unavailable.read().await {
            return Err(ProfileStoreError::Unavailable("in-memory store offline".to_string()));
        }
        self.profiles.write().await.insert(update.account, update.clone());
        Ok(())
    }

    async fn load_profile(&self, account: &Address) -> Result<Option<ProfileUpdate>, ProfileStoreError> {
        Ok(self.profiles.read().await.get(account).cloned())
    }
}

/// Profile service reached over HTTP: `PUT`/`GET {base}/profiles/{account}`
pub struct HttpProfileStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProfileStore {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Store for the configured URL, or `None` when no URL is configured
    pub fn from_config(config: &ProfileStoreConfig) -> Result<Option<Self>, ProfileStoreError> {
        let url = match &config.url {
            Some(url) => url,
            None => return Ok(None),
        };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProfileStoreError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Some(Self::new(url.clone(), client)))
    }

    fn profile_url(&self, account: &Address) -> String {
        format!("{}/profiles/{}", self.base_url, account)
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn save_profile(&self, update: &ProfileUpdate) -> Result<(), ProfileStoreError> {
        let url = self.profile_url(&update.account);
        debug!("Saving profile for {} to {}", update.account, url);

        let response = self
            .client
            .put(&url)
            .json(update)
            .send()
            .await
            .map_err(|e| ProfileStoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProfileStoreError::Rejected(format!(
                "Profile service returned status: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn load_profile(&self, account: &Address) -> Result<Option<ProfileUpdate>, ProfileStoreError> {
        let response = self
            .client
            .get(self.profile_url(account))
            .send()
            .await
            .map_err(|e| ProfileStoreError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProfileStoreError::Rejected(format!(
                "Profile service returned status: {}",
                response.status()
            )));
        }

        response
            .json::<ProfileUpdate>()
            .await
            .map(Some)
            .map_err(|e| ProfileStoreError::Serialization(e.to_string()))
    }
}
