//! Subscription lifecycle: extending a plan after payment and describing it.

use chrono::{DateTime, Months, Utc};
use unic_langid::LanguageIdentifier;

use crate::i18n;
use crate::storage::profile::{PlanDuration, Subscription, SubscriptionStatus, UserRecord};

/// Returns the subscription after paying for `plan` at `now`.
///
/// A running subscription is extended from its current end date, an
/// expired or inactive one restarts at `now`. Lifetime plans never end.
pub fn extend_subscription(current: &Subscription, plan: PlanDuration, now: DateTime<Utc>) -> Subscription {
    let running_end = match current.subscription_status {
        SubscriptionStatus::Active => current.end_subscription.filter(|end| *end > now),
        SubscriptionStatus::Inactive => None,
    };
    let lifetime_running = current.subscription_status == SubscriptionStatus::Active
        && current.duration == PlanDuration::Forever
        && current.end_subscription.is_none();

    let start = match (running_end, lifetime_running) {
        (Some(_), _) | (_, true) => current.start_subscription.unwrap_or(now),
        _ => now,
    };
    let base = running_end.unwrap_or(now);

    let end = match plan {
        PlanDuration::Month => base.checked_add_months(Months::new(1)),
        PlanDuration::Year => base.checked_add_months(Months::new(12)),
        PlanDuration::Forever => None,
    };

    Subscription {
        start_subscription: Some(start),
        end_subscription: if lifetime_running { None } else { end },
        subscription_status: SubscriptionStatus::Active,
        duration: if lifetime_running { PlanDuration::Forever } else { plan },
    }
}

/// Text of the /status reply
pub fn status_text(lang: &LanguageIdentifier, record: Option<&UserRecord>) -> String {
    let Some(record) = record else {
        return i18n::t(lang, "status-unknown");
    };

    if !record.is_subscriber() {
        return format!(
            "{} {}\n{} {:.2} MB",
            i18n::t(lang, "status-label"),
            i18n::t(lang, "status-inactive"),
            i18n::t(lang, "status-traffic"),
            record.traffic
        );
    }

    let expiry = match record.subscription.end_subscription {
        Some(end) => end.format("%Y-%m-%d").to_string(),
        None => i18n::t(lang, "status-never"),
    };
    format!(
        "{} {}\n{} {}",
        i18n::t(lang, "status-label"),
        i18n::t(lang, "status-active"),
        i18n::t(lang, "status-expires"),
        expiry
    )
}
