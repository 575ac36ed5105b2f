//! Per-user traffic accounting against the plan limit.
//!
//! The profile service is the only store. Every call is bounded by a timeout;
//! quota lookups fail open so an unavailable service never blocks downloads.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::config;
use crate::core::subscription::extend_subscription;
use crate::core::utils::bytes_to_mb;
use crate::storage::profile::{PlanDuration, ProfileError, ProfileStore, UserRecord};

/// Identity of the chat user a request belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub username: String,
    pub chat_id: i64,
}

impl UserRef {
    pub fn new(username: impl Into<String>, chat_id: i64) -> Self {
        Self {
            username: username.into(),
            chat_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuotaDecision {
    Allowed,
    Denied {
        current_mb: f64,
        requested_mb: f64,
        limit_mb: f64,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub plan_limit_mb: f64,
    pub call_timeout: Duration,
    pub payment_timeout: Duration,
}

impl LedgerSettings {
    pub fn from_config() -> Self {
        Self {
            plan_limit_mb: config::limits::TRAFFIC_LIMIT_MB,
            call_timeout: config::profile::call_timeout(),
            payment_timeout: config::profile::payment_timeout(),
        }
    }
}

pub struct TrafficLedger {
    store: Arc<dyn ProfileStore>,
    settings: LedgerSettings,
}

impl TrafficLedger {
    pub fn new(store: Arc<dyn ProfileStore>, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn plan_limit_mb(&self) -> f64 {
        self.settings.plan_limit_mb
    }

    async fn bounded<T, F>(&self, limit: Duration, fut: F) -> Result<T, ProfileError>
    where
        F: Future<Output = Result<T, ProfileError>>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ProfileError::Timeout(limit))?
    }

    async fn get_or_create(&self, user: &UserRef) -> Result<UserRecord, ProfileError> {
        if let Some(record) = self.store.get_user(&user.username).await? {
            return Ok(record);
        }
        let record = UserRecord::new(user.username.clone(), user.chat_id);
        self.store.create_user(&record).await?;
        Ok(record)
    }

    /// Creates the profile if it is missing. Returns true when it was created.
    pub async fn ensure_user(&self, user: &UserRef) -> Result<bool, ProfileError> {
        self.bounded(self.settings.call_timeout, async {
            if self.store.user_exists(&user.username).await? {
                return Ok(false);
            }
            self.store
                .create_user(&UserRecord::new(user.username.clone(), user.chat_id))
                .await?;
            Ok(true)
        })
        .await
    }

    /// Current record, `None` for unknown users
    pub async fn user_record(&self, user: &UserRef) -> Result<Option<UserRecord>, ProfileError> {
        self.bounded(self.settings.call_timeout, self.store.get_user(&user.username))
            .await
    }

    /// Decides whether `requested_mb` more traffic is allowed.
    ///
    /// Denied only when `current + requested > limit` and the user has no
    /// active subscription. Lookup failures and unknown users are allowed.
    pub async fn check_quota(&self, user: &UserRef, requested_mb: f64) -> QuotaDecision {
        let record = match self.user_record(user).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::info!("Quota check: {} has no profile yet, allowing", user.username);
                return QuotaDecision::Allowed;
            }
            Err(e) => {
                log::warn!("Quota check for {} failed open: {}", user.username, e);
                return QuotaDecision::Allowed;
            }
        };

        let limit = self.settings.plan_limit_mb;
        if record.traffic + requested_mb > limit && !record.is_subscriber() {
            log::info!(
                "🚫 Quota denied for {}: {:.2} + {:.2} MB > {} MB",
                user.username,
                record.traffic,
                requested_mb,
                limit
            );
            return QuotaDecision::Denied {
                current_mb: record.traffic,
                requested_mb,
                limit_mb: limit,
            };
        }
        QuotaDecision::Allowed
    }

    /// Adds delivered bytes to the user's traffic, creating the profile first
    /// when needed. Returns the new total in MB.
    pub async fn record_usage(&self, user: &UserRef, delivered_bytes: u64) -> Result<f64, ProfileError> {
        let delta = bytes_to_mb(delivered_bytes);
        self.bounded(self.settings.call_timeout, async {
            let record = self.get_or_create(user).await?;
            let total = record.traffic + delta;
            self.store.update_traffic(&user.username, total).await?;
            log::info!(
                "📊 Traffic of {}: {:.2} MB (+{:.2} MB)",
                user.username,
                total,
                delta
            );
            Ok(total)
        })
        .await
    }

    /// Marks the subscription active for `plan`, extending any running one.
    pub async fn activate_subscription(
        &self,
        user: &UserRef,
        plan: PlanDuration,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, ProfileError> {
        self.bounded(self.settings.payment_timeout, async {
            let mut record = self.get_or_create(user).await?;
            record.subscription = extend_subscription(&record.subscription, plan, now);
            record.chat_id = user.chat_id;
            self.store.update_user(&record).await?;
            log::info!(
                "💳 Subscription of {} active until {:?}",
                user.username,
                record.subscription.end_subscription
            );
            Ok(record)
        })
        .await
    }
}
