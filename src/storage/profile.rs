//! Client of the external user profile service.
//!
//! The service owns every user's cumulative traffic and subscription. It is
//! reached over HTTPS with a bearer token, optionally through a pinned
//! certificate.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Certificate, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::core::config;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("profile service answered {status} for {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("profile call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("invalid profile service url: {0}")]
    InvalidUrl(String),
    #[error("cannot load profile service certificate: {0}")]
    Certificate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
}

/// Length of a paid plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanDuration {
    #[default]
    Month,
    Year,
    #[serde(alias = "lifetime")]
    Forever,
}

impl PlanDuration {
    /// Parses a payment payload: `month`, `year` or `lifetime`, optionally
    /// as `subscription:<plan>[:<anything>]`
    pub fn from_payload(payload: &str) -> Option<Self> {
        let payload = payload.trim().to_lowercase();
        let mut parts = payload.split(':');
        let first = parts.next().unwrap_or_default();
        let plan = if first == "subscription" {
            parts.next().unwrap_or_default()
        } else {
            first
        };
        match plan {
            "month" => Some(PlanDuration::Month),
            "year" => Some(PlanDuration::Year),
            "lifetime" | "forever" => Some(PlanDuration::Forever),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub start_subscription: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_subscription: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub duration: PlanDuration,
}

/// One user as stored by the profile service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// Cumulative traffic in MB
    #[serde(default)]
    pub traffic: f64,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default)]
    pub subscription: Subscription,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, chat_id: i64) -> Self {
        Self {
            username: username.into(),
            traffic: 0.0,
            chat_id,
            subscription: Subscription::default(),
        }
    }

    pub fn is_subscriber(&self) -> bool {
        self.subscription.subscription_status == SubscriptionStatus::Active
    }
}

/// Operations the bot needs from the profile service.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_user(&self, user: &UserRecord) -> Result<(), ProfileError>;

    /// `None` when the user is unknown
    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, ProfileError>;

    async fn user_exists(&self, username: &str) -> Result<bool, ProfileError>;

    /// Overwrites the cumulative traffic (MB)
    async fn update_traffic(&self, username: &str, traffic_mb: f64) -> Result<(), ProfileError>;

    /// Overwrites the whole record, subscription included
    async fn update_user(&self, user: &UserRecord) -> Result<(), ProfileError>;
}

/// reqwest implementation of `ProfileStore`
pub struct ProfileClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl ProfileClient {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        root_cert_pem: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Self, ProfileError> {
        let base_url = Url::parse(base_url).map_err(|e| ProfileError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ProfileError::InvalidUrl(base_url.to_string()));
        }

        let mut builder = Client::builder().timeout(timeout);
        if let Some(pem) = root_cert_pem {
            let cert = Certificate::from_pem(pem).map_err(|e| ProfileError::Certificate(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            token: token.into(),
        })
    }

    /// Builds the client from environment configuration. The certificate is
    /// optional: when the file does not exist only system roots are trusted.
    pub fn from_config() -> Result<Self, ProfileError> {
        let cert_path = Path::new(config::PROFILE_CERT_PATH.as_str());
        let pem = if cert_path.exists() {
            Some(fs_err::read(cert_path).map_err(|e| ProfileError::Certificate(e.to_string()))?)
        } else {
            None
        };

        Self::new(
            &config::PROFILE_SERVICE_URL,
            config::PROFILE_SERVICE_TOKEN.as_str(),
            pem.as_deref(),
            config::profile::http_timeout(),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProfileError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProfileError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn unexpected(status: StatusCode, url: &Url) -> ProfileError {
        ProfileError::Status {
            status: status.as_u16(),
            endpoint: url.path().to_string(),
        }
    }
}

#[async_trait]
impl ProfileStore for ProfileClient {
    async fn create_user(&self, user: &UserRecord) -> Result<(), ProfileError> {
        let url = self.endpoint(&["users"])?;
        let response = self.http.post(url.clone()).bearer_auth(&self.token).json(user).send().await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                log::info!("👤 Created profile for {}", user.username);
                Ok(())
            }
            status => Err(Self::unexpected(status, &url)),
        }
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, ProfileError> {
        let url = self.endpoint(&["users", username])?;
        let response = self.http.get(url.clone()).bearer_auth(&self.token).send().await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<UserRecord>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::unexpected(status, &url)),
        }
    }

    async fn user_exists(&self, username: &str) -> Result<bool, ProfileError> {
        let url = self.endpoint(&["users", username, "exists"])?;
        let response = self.http.get(url.clone()).bearer_auth(&self.token).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Self::unexpected(status, &url)),
        }
    }

    async fn update_traffic(&self, username: &str, traffic_mb: f64) -> Result<(), ProfileError> {
        let url = self.endpoint(&["users", username, "traffic"])?;
        let response = self
            .http
            .put(url.clone())
            .bearer_auth(&self.token)
            .json(&traffic_mb)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(Self::unexpected(status, &url)),
        }
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), ProfileError> {
        let url = self.endpoint(&["users", &user.username])?;
        let response = self.http.put(url.clone()).bearer_auth(&self.token).json(user).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(Self::unexpected(status, &url)),
        }
    }
}
