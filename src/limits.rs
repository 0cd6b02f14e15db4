use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, error, info, warn, Logger};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::clock::{epoch_ms, Clock};
use crate::identity::{Identity, IdentityProvider, Tier};
use crate::store::{keys, KvStore};

/// Usage within one quota window, and when the window rolls over.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaWindow {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    /// The next reset instant, in epoch milliseconds.
    pub reset_time: i64,
}

impl QuotaWindow {
    fn new(used: u32, limit: u32, reset_time: i64) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
            reset_time,
        }
    }

    fn exceeded(&self) -> bool {
        self.used >= self.limit
    }
}

/// Enumerates the window that blocked a package, daily taking
/// precedence when both are out.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingFactor {
    Daily,
    Monthly,
}

/// The verdict on whether the caller may generate another package.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageGate {
    pub allowed: bool,
    pub tier: Tier,
    pub daily: QuotaWindow,
    pub monthly: QuotaWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_factor: Option<BlockingFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_in: Option<String>,
}

/// A caller's usage summary across both windows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub tier: Tier,
    pub daily: QuotaWindow,
    pub monthly: QuotaWindow,
    pub total_packages: u64,
}

/// The upsell shown to callers who have more quota available on the
/// next tier up. `action` is the button label, `action_type` the
/// machine-readable action it triggers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePrompt {
    pub title: &'static str,
    pub message: &'static str,
    pub action: &'static str,
    pub action_type: &'static str,
}

/// Returns the upgrade pitch for a tier, if there is a tier above it.
pub fn upgrade_message(tier: Tier) -> Option<UpgradePrompt> {
    match tier {
        Tier::Anonymous => Some(UpgradePrompt {
            title: "Sign in for 4x More Packages!",
            message: "Get 4 packages daily instead of 1",
            action: "Sign In with Google",
            action_type: "signin",
        }),
        Tier::Authenticated => Some(UpgradePrompt {
            title: "Upgrade to Premium",
            message: "Get 20 packages daily and 200 monthly",
            action: "Upgrade to Premium",
            action_type: "upgrade",
        }),
        Tier::Premium => None,
    }
}

/// Lifetime totals for one caller. The seen stamps are epoch
/// milliseconds.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct UserAggregate {
    tier: Tier,
    first_seen: i64,
    last_seen: i64,
    total_packages: u64,
}

/// The stored usage document: per-day and per-month counters keyed by
/// bucket then user, plus lifetime aggregates.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct UsageTracking {
    daily: BTreeMap<String, BTreeMap<String, u32>>,
    monthly: BTreeMap<String, BTreeMap<String, u32>>,
    users: BTreeMap<String, UserAggregate>,
    last_cleanup: Option<i64>,
}

/// Receives a notification for every recorded package.
pub trait UsageReporter: Send + Sync {
    fn package_generated(&self, user_id: &str, package_type: &str) -> BoxFuture<'static, ()>;
}

/// Reports packages to the log and nowhere else.
pub struct LogReporter {
    logger: Arc<Logger>,
}

impl LogReporter {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl UsageReporter for LogReporter {
    fn package_generated(&self, user_id: &str, package_type: &str) -> BoxFuture<'static, ()> {
        let logger = self.logger.clone();
        let user_id = user_id.to_owned();
        let package_type = package_type.to_owned();

        async move {
            info!(logger, "Package generated"; "user_id" => user_id, "package_type" => package_type);
        }
        .boxed()
    }
}

/// Enforces per-tier daily and monthly package quotas.
///
/// The limiter fails open: when the store or the identity layer is
/// unavailable it degrades to a fresh document or the anonymous
/// identity rather than refusing service.
pub struct UsageLimiter {
    logger: Arc<Logger>,
    store: Arc<dyn KvStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    reporter: Option<Arc<dyn UsageReporter>>,
    tracking: Mutex<Option<UsageTracking>>,
}

impl UsageLimiter {
    pub fn new(
        logger: Arc<Logger>,
        store: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        reporter: Option<Arc<dyn UsageReporter>>,
    ) -> Self {
        Self {
            logger,
            store,
            identity,
            clock,
            reporter,
            tracking: Mutex::new(None),
        }
    }

    /// Decides whether the caller may generate another package right
    /// now. A blocked verdict names the window responsible and how
    /// long until it resets.
    pub async fn check(&self) -> PackageGate {
        let identity = self.resolve_identity().await;
        let now = self.clock.now_utc();

        let mut guard = self.tracking.lock().await;
        let tracking = self.ensure_loaded(&mut *guard).await;

        gate_for(tracking, &identity, &now)
    }

    /// Counts a generated package against the caller's windows and
    /// lifetime totals, then persists.
    pub async fn record(&self, package_type: &str) -> UsageStats {
        let identity = self.resolve_identity().await;
        let now = self.clock.now_utc();

        let stats = {
            let mut guard = self.tracking.lock().await;
            let tracking = self.ensure_loaded(&mut *guard).await;

            *tracking
                .daily
                .entry(daily_key(&now))
                .or_default()
                .entry(identity.user_id.clone())
                .or_insert(0) += 1;
            *tracking
                .monthly
                .entry(monthly_key(&now))
                .or_default()
                .entry(identity.user_id.clone())
                .or_insert(0) += 1;

            let stamp = epoch_ms(&now);
            let aggregate = tracking
                .users
                .entry(identity.user_id.clone())
                .or_insert_with(|| UserAggregate {
                    tier: identity.tier,
                    first_seen: stamp,
                    last_seen: stamp,
                    total_packages: 0,
                });
            aggregate.last_seen = stamp;
            aggregate.total_packages += 1;

            debug!(self.logger, "Recorded package"; "user_id" => %identity.user_id, "package_type" => package_type);
            self.persist(tracking).await;

            stats_for(tracking, &identity, &now)
        };

        if let Some(reporter) = &self.reporter {
            reporter
                .package_generated(&identity.user_id, package_type)
                .await;
        }

        stats
    }

    /// The caller's current usage without recording anything.
    pub async fn usage_stats(&self) -> UsageStats {
        let identity = self.resolve_identity().await;
        let now = self.clock.now_utc();

        let mut guard = self.tracking.lock().await;
        let tracking = self.ensure_loaded(&mut *guard).await;

        stats_for(tracking, &identity, &now)
    }

    /// Drops daily buckets older than a day and monthly buckets older
    /// than thirty days, then stamps the cleanup time. Buckets whose
    /// keys no longer parse as dates are dropped too.
    pub async fn purge_stale(&self) {
        let now = self.clock.now_utc();

        let mut guard = self.tracking.lock().await;
        let tracking = self.ensure_loaded(&mut *guard).await;

        let daily_cutoff = now - Duration::hours(24);
        let monthly_cutoff = now - Duration::days(30);

        let before = tracking.daily.len() + tracking.monthly.len();
        tracking.daily.retain(|key, _| {
            daily_bucket_start(key)
                .map(|start| start >= daily_cutoff)
                .unwrap_or(false)
        });
        tracking.monthly.retain(|key, _| {
            monthly_bucket_start(key)
                .map(|start| start >= monthly_cutoff)
                .unwrap_or(false)
        });
        let dropped = before - (tracking.daily.len() + tracking.monthly.len());

        tracking.last_cleanup = Some(epoch_ms(&now));
        if dropped > 0 {
            info!(self.logger, "Purged stale usage buckets"; "dropped" => dropped);
        }

        self.persist(tracking).await;
    }

    async fn resolve_identity(&self) -> Identity {
        match self.identity.resolve().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(self.logger, "Identity unavailable; treating caller as anonymous"; "error" => %e);
                Identity::fallback()
            }
        }
    }

    async fn ensure_loaded<'a>(&self, slot: &'a mut Option<UsageTracking>) -> &'a mut UsageTracking {
        let loaded = match slot.take() {
            Some(tracking) => tracking,
            None => self.load_tracking().await,
        };

        slot.get_or_insert(loaded)
    }

    async fn load_tracking(&self) -> UsageTracking {
        match self.store.get(keys::USAGE_TRACKING).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(tracking) => tracking,
                Err(e) => {
                    warn!(self.logger, "Replacing unreadable usage document"; "error" => %e);
                    UsageTracking::default()
                }
            },
            Ok(None) => UsageTracking::default(),
            Err(e) => {
                warn!(self.logger, "Failed to load usage document; starting fresh"; "error" => %e);
                UsageTracking::default()
            }
        }
    }

    async fn persist(&self, tracking: &UsageTracking) {
        let value = match serde_json::to_value(tracking) {
            Ok(value) => value,
            Err(e) => {
                error!(self.logger, "Failed to serialize usage document"; "error" => %e);
                return;
            }
        };

        if let Err(e) = self.store.set(keys::USAGE_TRACKING, value).await {
            error!(self.logger, "Failed to save usage document"; "error" => %e);
        }
    }
}

fn gate_for(tracking: &UsageTracking, identity: &Identity, now: &OffsetDateTime) -> PackageGate {
    let quota = identity.tier.quota();
    let daily_reset = next_daily_reset(now);
    let monthly_reset = next_monthly_reset(now);

    let daily = QuotaWindow::new(
        count_for(&tracking.daily, &daily_key(now), &identity.user_id),
        quota.daily,
        epoch_ms(&daily_reset),
    );
    let monthly = QuotaWindow::new(
        count_for(&tracking.monthly, &monthly_key(now), &identity.user_id),
        quota.monthly,
        epoch_ms(&monthly_reset),
    );

    let blocking_factor = if daily.exceeded() {
        Some(BlockingFactor::Daily)
    } else if monthly.exceeded() {
        Some(BlockingFactor::Monthly)
    } else {
        None
    };

    let resets_in = blocking_factor.map(|factor| {
        let reset = match factor {
            BlockingFactor::Daily => daily_reset,
            BlockingFactor::Monthly => monthly_reset,
        };

        format_time_until_reset(now, &reset)
    });

    PackageGate {
        allowed: blocking_factor.is_none(),
        tier: identity.tier,
        daily,
        monthly,
        blocking_factor,
        resets_in,
    }
}

fn stats_for(tracking: &UsageTracking, identity: &Identity, now: &OffsetDateTime) -> UsageStats {
    let quota = identity.tier.quota();

    UsageStats {
        tier: identity.tier,
        daily: QuotaWindow::new(
            count_for(&tracking.daily, &daily_key(now), &identity.user_id),
            quota.daily,
            epoch_ms(&next_daily_reset(now)),
        ),
        monthly: QuotaWindow::new(
            count_for(&tracking.monthly, &monthly_key(now), &identity.user_id),
            quota.monthly,
            epoch_ms(&next_monthly_reset(now)),
        ),
        total_packages: tracking
            .users
            .get(&identity.user_id)
            .map(|aggregate| aggregate.total_packages)
            .unwrap_or(0),
    }
}

fn count_for(
    windows: &BTreeMap<String, BTreeMap<String, u32>>,
    key: &str,
    user_id: &str,
) -> u32 {
    windows
        .get(key)
        .and_then(|counts| counts.get(user_id))
        .copied()
        .unwrap_or(0)
}

fn daily_key(now: &OffsetDateTime) -> String {
    format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day())
}

fn monthly_key(now: &OffsetDateTime) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}

fn daily_bucket_start(key: &str) -> Option<OffsetDateTime> {
    let mut parts = key.splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;

    Some(Date::try_from_ymd(year, month, day).ok()?.midnight().assume_utc())
}

fn monthly_bucket_start(key: &str) -> Option<OffsetDateTime> {
    let mut parts = key.splitn(2, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;

    Some(Date::try_from_ymd(year, month, 1).ok()?.midnight().assume_utc())
}

fn next_daily_reset(now: &OffsetDateTime) -> OffsetDateTime {
    now.date().next_day().midnight().assume_utc()
}

fn next_monthly_reset(now: &OffsetDateTime) -> OffsetDateTime {
    let date = now.date();
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    Date::try_from_ymd(year, month, 1)
        .expect("first of month is always valid")
        .midnight()
        .assume_utc()
}

/// Formats the time until a reset as the UI shows it, whole units
/// rounded down.
pub fn format_time_until_reset(now: &OffsetDateTime, reset: &OffsetDateTime) -> String {
    let remaining = *reset - *now;
    if remaining <= Duration::zero() {
        return "Now".to_owned();
    }

    let hours = remaining.whole_hours();
    let minutes = remaining.whole_minutes() % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::clock::ManualClock;
    use crate::identity::{FingerprintIdentity, FixedIdentity, NoIdentity, UserProfile};
    use crate::store::memory::MemoryStore;
    use crate::store::mock::FailingStore;

    use super::*;

    // 2026-08-23T10:30:00Z; 13h 30m before the daily reset
    fn august_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Date::try_from_ymd(2026, 8, 23)
                .unwrap()
                .try_with_hms(10, 30, 0)
                .unwrap()
                .assume_utc(),
        ))
    }

    fn anonymous() -> Arc<dyn IdentityProvider> {
        Arc::new(FingerprintIdentity::new("test-fingerprint"))
    }

    fn authenticated() -> Arc<dyn IdentityProvider> {
        Arc::new(FixedIdentity::new(UserProfile::new(
            "artist-001",
            Some("artist@example.com".to_owned()),
            false,
        )))
    }

    fn premium() -> Arc<dyn IdentityProvider> {
        Arc::new(FixedIdentity::new(UserProfile::new(
            "artist-001",
            Some("artist@example.com".to_owned()),
            true,
        )))
    }

    fn limiter(
        store: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<ManualClock>,
    ) -> UsageLimiter {
        UsageLimiter::new(Arc::new(log::discard()), store, identity, clock, None)
    }

    fn daily_window(used: u32, limit: u32, clock: &ManualClock) -> QuotaWindow {
        QuotaWindow::new(used, limit, epoch_ms(&next_daily_reset(&clock.now_utc())))
    }

    fn monthly_window(used: u32, limit: u32, clock: &ManualClock) -> QuotaWindow {
        QuotaWindow::new(used, limit, epoch_ms(&next_monthly_reset(&clock.now_utc())))
    }

    #[tokio::test]
    async fn fresh_anonymous_callers_are_allowed() {
        let clock = august_clock();
        let limiter = limiter(Arc::new(MemoryStore::new()), anonymous(), clock.clone());

        let gate = limiter.check().await;

        assert!(gate.allowed);
        assert_eq!(gate.tier, Tier::Anonymous);
        assert_eq!(gate.daily, daily_window(0, 1, &clock));
        assert_eq!(gate.monthly, monthly_window(0, 10, &clock));
        assert_eq!(gate.blocking_factor, None);
        assert_eq!(gate.resets_in, None);
    }

    #[tokio::test]
    async fn the_daily_quota_blocks_an_anonymous_caller_after_one_package() {
        let clock = august_clock();
        let limiter = limiter(Arc::new(MemoryStore::new()), anonymous(), clock.clone());

        let stats = limiter.record("radio").await;
        assert_eq!(stats.daily, daily_window(1, 1, &clock));
        assert_eq!(stats.total_packages, 1);

        let gate = limiter.check().await;
        assert!(!gate.allowed);
        assert_eq!(gate.blocking_factor, Some(BlockingFactor::Daily));
        assert_eq!(gate.resets_in.as_deref(), Some("13h 30m"));

        clock.advance(Duration::days(1));

        let gate = limiter.check().await;
        assert!(gate.allowed, "the daily window resets at midnight");
        assert_eq!(gate.daily, daily_window(0, 1, &clock));
        assert_eq!(gate.monthly, monthly_window(1, 10, &clock));
    }

    #[tokio::test]
    async fn the_monthly_quota_blocks_despite_daily_headroom() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            keys::USAGE_TRACKING,
            json!({
                "daily": { "2026-08-23": { "artist-001": 2 } },
                "monthly": { "2026-08": { "artist-001": 50 } },
                "users": {},
                "lastCleanup": null,
            }),
        );

        let clock = august_clock();
        let limiter = limiter(store, authenticated(), clock.clone());

        let gate = limiter.check().await;
        assert!(!gate.allowed);
        assert_eq!(gate.daily, daily_window(2, 4, &clock));
        assert_eq!(gate.monthly, monthly_window(50, 50, &clock));
        assert_eq!(gate.blocking_factor, Some(BlockingFactor::Monthly));
        assert_eq!(gate.resets_in.as_deref(), Some("205h 30m"));
    }

    #[tokio::test]
    async fn the_daily_window_takes_precedence_when_both_are_out() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            keys::USAGE_TRACKING,
            json!({
                "daily": { "2026-08-23": { "artist-001": 4 } },
                "monthly": { "2026-08": { "artist-001": 50 } },
            }),
        );

        let limiter = limiter(store, authenticated(), august_clock());

        let gate = limiter.check().await;
        assert_eq!(gate.blocking_factor, Some(BlockingFactor::Daily));
    }

    #[tokio::test]
    async fn premium_callers_get_the_largest_quota() {
        let clock = august_clock();
        let limiter = limiter(Arc::new(MemoryStore::new()), premium(), clock.clone());

        let gate = limiter.check().await;

        assert_eq!(gate.tier, Tier::Premium);
        assert_eq!(gate.daily, daily_window(0, 20, &clock));
        assert_eq!(gate.monthly, monthly_window(0, 200, &clock));
    }

    #[tokio::test]
    async fn recording_updates_counters_and_aggregates_on_disk() {
        let store = Arc::new(MemoryStore::new());
        let clock = august_clock();
        let limiter = limiter(store.clone(), authenticated(), clock.clone());

        limiter.record("radio").await;
        let stats = limiter.record("press_kit").await;

        assert_eq!(stats.daily, daily_window(2, 4, &clock));
        assert_eq!(stats.monthly, monthly_window(2, 50, &clock));
        assert_eq!(stats.total_packages, 2);

        let stored = store.get(keys::USAGE_TRACKING).await.unwrap().unwrap();
        assert_eq!(stored["daily"]["2026-08-23"]["artist-001"], json!(2));
        assert_eq!(stored["monthly"]["2026-08"]["artist-001"], json!(2));
        assert_eq!(stored["users"]["artist-001"]["totalPackages"], json!(2));
        assert_eq!(stored["users"]["artist-001"]["tier"], json!("authenticated"));
        assert_eq!(
            stored["users"]["artist-001"]["firstSeen"],
            json!(1_787_481_000_000_i64)
        );
    }

    #[tokio::test]
    async fn recording_notifies_the_reporter() {
        #[derive(Default)]
        struct RecordingReporter {
            calls: std::sync::Mutex<Vec<(String, String)>>,
        }

        impl UsageReporter for RecordingReporter {
            fn package_generated(
                &self,
                user_id: &str,
                package_type: &str,
            ) -> BoxFuture<'static, ()> {
                self.calls
                    .lock()
                    .unwrap()
                    .push((user_id.to_owned(), package_type.to_owned()));

                futures::future::ready(()).boxed()
            }
        }

        let reporter = Arc::new(RecordingReporter::default());
        let limiter = UsageLimiter::new(
            Arc::new(log::discard()),
            Arc::new(MemoryStore::new()),
            authenticated(),
            august_clock(),
            Some(reporter.clone()),
        );

        limiter.record("radio").await;

        assert_eq!(
            *reporter.calls.lock().unwrap(),
            vec![("artist-001".to_owned(), "radio".to_owned())]
        );
    }

    #[tokio::test]
    async fn purging_drops_expired_and_unparseable_buckets() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            keys::USAGE_TRACKING,
            json!({
                "daily": {
                    "2026-08-21": { "artist-001": 1 },
                    "2026-08-22": { "artist-001": 1 },
                    "2026-08-23": { "artist-001": 1 },
                    "not-a-date": { "artist-001": 1 },
                },
                "monthly": {
                    "2026-06": { "artist-001": 1 },
                    "2026-07": { "artist-001": 1 },
                    "2026-08": { "artist-001": 1 },
                },
            }),
        );

        let limiter = limiter(store.clone(), authenticated(), august_clock());
        limiter.purge_stale().await;

        let stored = store.get(keys::USAGE_TRACKING).await.unwrap().unwrap();
        let daily: Vec<_> = stored["daily"]
            .as_object()
            .unwrap()
            .keys()
            .map(|key| key.as_str())
            .collect();
        let monthly: Vec<_> = stored["monthly"]
            .as_object()
            .unwrap()
            .keys()
            .map(|key| key.as_str())
            .collect();

        assert_eq!(daily, ["2026-08-23"]);
        assert_eq!(monthly, ["2026-08"]);
        assert_eq!(stored["lastCleanup"], json!(1_787_481_000_000_i64));
    }

    #[tokio::test]
    async fn the_limiter_fails_open_when_storage_is_unavailable() {
        let reads = limiter(Arc::new(FailingStore::Reads), anonymous(), august_clock());
        assert!(reads.check().await.allowed);

        let writes = limiter(Arc::new(FailingStore::Writes), anonymous(), august_clock());
        let stats = writes.record("radio").await;
        assert_eq!(stats.daily.used, 1, "counts survive in memory when saves fail");
        assert!(!writes.check().await.allowed);
    }

    #[tokio::test]
    async fn identity_failures_degrade_to_the_anonymous_fallback() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store.clone(), Arc::new(NoIdentity), august_clock());

        let gate = limiter.check().await;
        assert_eq!(gate.tier, Tier::Anonymous);
        assert_eq!(gate.daily.limit, 1);

        limiter.record("radio").await;
        let stored = store.get(keys::USAGE_TRACKING).await.unwrap().unwrap();
        assert_eq!(stored["daily"]["2026-08-23"]["default"], json!(1));
    }

    #[tokio::test]
    async fn corrupt_usage_documents_are_replaced() {
        let store = Arc::new(MemoryStore::new());
        store.seed(keys::USAGE_TRACKING, json!({ "daily": 5 }));

        let limiter = limiter(store, anonymous(), august_clock());

        assert!(limiter.check().await.allowed);
    }

    #[tokio::test]
    async fn gates_serialize_to_their_wire_form() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store, anonymous(), august_clock());

        let open = serde_json::to_value(limiter.check().await).unwrap();
        assert_eq!(open["allowed"], json!(true));
        assert_eq!(open["daily"]["remaining"], json!(1));
        assert_eq!(open["daily"]["resetTime"], json!(1_787_529_600_000_i64));
        assert_eq!(open["monthly"]["resetTime"], json!(1_788_220_800_000_i64));
        assert!(open.get("blockingFactor").is_none());
        assert!(open.get("resetsIn").is_none());

        limiter.record("radio").await;

        let blocked = serde_json::to_value(limiter.check().await).unwrap();
        assert_eq!(blocked["allowed"], json!(false));
        assert_eq!(blocked["blockingFactor"], json!("daily"));
        assert_eq!(blocked["resetsIn"], json!("13h 30m"));
        assert_eq!(blocked["tier"], json!("anonymous"));
    }

    #[test]
    fn reset_countdowns_format_like_the_ui() {
        let now = Date::try_from_ymd(2026, 8, 23)
            .unwrap()
            .try_with_hms(10, 30, 0)
            .unwrap()
            .assume_utc();

        assert_eq!(format_time_until_reset(&now, &now), "Now");
        assert_eq!(
            format_time_until_reset(&now, &(now - Duration::seconds(1))),
            "Now"
        );
        assert_eq!(
            format_time_until_reset(&now, &(now + Duration::seconds(30))),
            "0m"
        );
        assert_eq!(
            format_time_until_reset(&now, &(now + Duration::minutes(45))),
            "45m"
        );
        assert_eq!(
            format_time_until_reset(&now, &(now + Duration::minutes(125))),
            "2h 5m"
        );
        assert_eq!(
            format_time_until_reset(&now, &(now + Duration::days(2))),
            "48h 0m"
        );
    }

    #[test]
    fn upgrade_prompts_target_the_next_tier_up() {
        let anonymous = upgrade_message(Tier::Anonymous).unwrap();
        assert_eq!(anonymous.title, "Sign in for 4x More Packages!");
        assert_eq!(anonymous.action_type, "signin");

        let authenticated = upgrade_message(Tier::Authenticated).unwrap();
        assert_eq!(authenticated.action, "Upgrade to Premium");
        assert_eq!(authenticated.action_type, "upgrade");

        assert_eq!(upgrade_message(Tier::Premium), None);

        let wire = serde_json::to_value(anonymous).unwrap();
        assert_eq!(wire["action"], serde_json::json!("Sign In with Google"));
        assert_eq!(wire["actionType"], serde_json::json!("signin"));
    }

    #[test]
    fn monthly_resets_land_on_the_first_of_the_next_month() {
        let december = Date::try_from_ymd(2026, 12, 15)
            .unwrap()
            .midnight()
            .assume_utc();
        let reset = next_monthly_reset(&december);

        assert_eq!((reset.year(), reset.month(), reset.day()), (2027, 1, 1));
    }

    #[test]
    fn reset_instants_land_on_utc_boundaries() {
        let now = august_clock().now_utc();

        // 2026-08-24T00:00:00Z and 2026-09-01T00:00:00Z
        assert_eq!(epoch_ms(&next_daily_reset(&now)), 1_787_529_600_000);
        assert_eq!(epoch_ms(&next_monthly_reset(&now)), 1_788_220_800_000);
    }
}
