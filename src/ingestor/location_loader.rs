//! Location cache loader
//!
//! Fetches the province tree once, writes every division record and its
//! name-index membership, and sets the `location:loaded` guard as the very
//! last write. Callers may invoke [`LocationCacheLoader::ensure_loaded`]
//! from any number of tasks; at most one generation runs per process, and
//! with the store lock enabled at most one runs across processes sharing a
//! store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state_manager::LoadStateManager;
use crate::cache::{CacheKey, CacheStore};
use crate::config::{LoaderConfig, PayloadLayout};
use crate::errors::{LoadError, LoadResult, StoreError, StoreResult};
use crate::models::{
    District, DivisionLevel, LoadOutcome, LoadReport, LoadTrigger, Province, Ward,
};
use crate::observability::LoaderMetrics;
use crate::sources::DivisionSource;
use crate::utils::{normalize, with_retry};

/// Value stored under `location:loading` while a process holds the load lock
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreLock {
    owner: Uuid,
    expires_at: DateTime<Utc>,
}

pub struct LocationCacheLoader {
    source: Arc<dyn DivisionSource>,
    store: Arc<dyn CacheStore>,
    config: LoaderConfig,
    state: LoadStateManager,
    metrics: LoaderMetrics,
    load_lock: Mutex<()>,
    instance_id: Uuid,
}

impl LocationCacheLoader {
    pub fn new(
        source: Arc<dyn DivisionSource>,
        store: Arc<dyn CacheStore>,
        config: LoaderConfig,
        state: LoadStateManager,
        metrics: LoaderMetrics,
    ) -> Self {
        Self {
            source,
            store,
            config,
            state,
            metrics,
            load_lock: Mutex::new(()),
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn state_manager(&self) -> &LoadStateManager {
        &self.state
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        self.store.clone()
    }

    /// Make sure a complete generation is present in the cache
    pub async fn ensure_loaded(&self) -> LoadResult<LoadOutcome> {
        self.ensure_loaded_by(LoadTrigger::Manual).await
    }

    /// [`ensure_loaded`](Self::ensure_loaded) attributed to a specific trigger
    pub async fn ensure_loaded_by(&self, trigger: LoadTrigger) -> LoadResult<LoadOutcome> {
        if self.guard_present(trigger).await? {
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        let _single_flight = self.load_lock.lock().await;

        // Another task may have completed a generation while we waited
        if self.guard_present(trigger).await? {
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        self.run_exclusive(trigger, false).await
    }

    /// Build a fresh generation even though one may already be present
    ///
    /// The guard is not cleared first: existing records stay readable and
    /// are overwritten as the new generation is written, and the guard
    /// timestamp is replaced only once that generation completes. A failed
    /// refresh leaves the previous generation and its guard untouched.
    pub async fn refresh(&self) -> LoadResult<LoadOutcome> {
        self.refresh_by(LoadTrigger::Manual).await
    }

    pub async fn refresh_by(&self, trigger: LoadTrigger) -> LoadResult<LoadOutcome> {
        let _single_flight = self.load_lock.lock().await;

        let previously_loaded = self
            .store
            .exists(&CacheKey::LoadedGuard.to_string())
            .await?;
        debug!(
            "Refresh ({}) requested, previous generation present: {}",
            trigger, previously_loaded
        );

        self.run_exclusive(trigger, previously_loaded).await
    }

    /// Take the store lock (when enabled) and run one generation
    ///
    /// Callers must hold `load_lock`.
    async fn run_exclusive(
        &self,
        trigger: LoadTrigger,
        previously_loaded: bool,
    ) -> LoadResult<LoadOutcome> {
        if self.config.distributed_lock && !self.acquire_store_lock().await? {
            info!(
                "Location load ({}) skipped: another process holds {}",
                trigger,
                CacheKey::LoadingLock
            );
            return Ok(LoadOutcome::InProgressElsewhere);
        }

        let result = self.run_tracked(trigger, previously_loaded).await;

        if self.config.distributed_lock {
            if let Err(e) = self.release_store_lock().await {
                warn!("Failed to release {}: {}", CacheKey::LoadingLock, e);
            }
        }

        result
    }

    async fn guard_present(&self, trigger: LoadTrigger) -> StoreResult<bool> {
        let present = self.store.exists(&CacheKey::LoadedGuard.to_string()).await?;
        if present {
            debug!("Location cache already loaded, {} trigger is a no-op", trigger);
            self.metrics.record_short_circuit(trigger);
            self.state.mark_loaded().await;
        }
        Ok(present)
    }

    async fn run_tracked(
        &self,
        trigger: LoadTrigger,
        previously_loaded: bool,
    ) -> LoadResult<LoadOutcome> {
        info!(
            "Starting location load ({}) from {}",
            trigger,
            self.source.describe()
        );
        self.state.start_load(trigger).await;
        self.metrics.record_attempt(trigger);
        let started = Instant::now();

        match self.run_generation().await {
            Ok(Some(report)) => {
                let elapsed = started.elapsed();
                info!(
                    "Location load ({}) completed in {:?}: {} provinces, {} districts, {} wards, {} skipped, {} index entries",
                    trigger,
                    elapsed,
                    report.provinces,
                    report.districts,
                    report.wards,
                    report.skipped,
                    report.index_entries
                );
                self.metrics.record_report(&report, elapsed);
                self.state.complete_load(report.clone()).await;
                Ok(LoadOutcome::Loaded(report))
            }
            Ok(None) => {
                warn!(
                    "Location load ({}) fetched no provinces; guard not updated",
                    trigger
                );
                self.state
                    .reset("Upstream returned no provinces", previously_loaded)
                    .await;
                Ok(LoadOutcome::Empty)
            }
            Err(e) => {
                error!("Location load ({}) failed: {}", trigger, e);
                self.metrics.record_failure(trigger, failure_stage(&e));
                self.state.set_error(e.to_string(), previously_loaded).await;
                Err(e)
            }
        }
    }

    /// Fetch and write one generation; `None` when upstream had nothing
    async fn run_generation(&self) -> LoadResult<Option<LoadReport>> {
        let source = &self.source;
        let provinces = with_retry(
            &self.config.retry,
            || source.fetch(),
            "fetch administrative divisions",
        )
        .await?;

        if provinces.is_empty() {
            return Ok(None);
        }

        let mut report = LoadReport {
            started_at: Some(Utc::now()),
            ..LoadReport::default()
        };

        self.state
            .update_step(format!("Writing {} provinces", provinces.len()))
            .await;

        for province in &provinces {
            self.write_province(province, &mut report).await?;
        }

        let completed_at = Utc::now();
        self.store
            .set_string(
                &CacheKey::LoadedGuard.to_string(),
                &completed_at.to_rfc3339(),
            )
            .await?;
        report.completed_at = Some(completed_at);

        Ok(Some(report))
    }

    async fn write_province(&self, province: &Province, report: &mut LoadReport) -> LoadResult<()> {
        let Some(code) = province.code else {
            debug!(
                "Skipping province without code: {:?} ({} districts dropped)",
                province.name,
                province.districts.len()
            );
            report.skipped += 1;
            return Ok(());
        };

        let payload = match self.config.layout {
            PayloadLayout::Nested => encode(DivisionLevel::Province, code, province)?,
            PayloadLayout::Flat => {
                encode(DivisionLevel::Province, code, &province.without_children())?
            }
        };
        self.write_record(DivisionLevel::Province, code, province.name.as_deref(), &payload, report)
            .await?;
        report.provinces += 1;

        for district in &province.districts {
            self.write_district(district, report).await?;
        }

        Ok(())
    }

    async fn write_district(&self, district: &District, report: &mut LoadReport) -> LoadResult<()> {
        let Some(code) = district.code else {
            debug!("Skipping district without code: {:?}", district.name);
            report.skipped += 1;
            return Ok(());
        };

        let payload = match self.config.layout {
            PayloadLayout::Nested => encode(DivisionLevel::District, code, district)?,
            PayloadLayout::Flat => {
                encode(DivisionLevel::District, code, &district.without_children())?
            }
        };
        self.write_record(DivisionLevel::District, code, district.name.as_deref(), &payload, report)
            .await?;
        report.districts += 1;

        if self.config.wards_enabled {
            for ward in &district.wards {
                self.write_ward(ward, report).await?;
            }
        }

        Ok(())
    }

    async fn write_ward(&self, ward: &Ward, report: &mut LoadReport) -> LoadResult<()> {
        let Some(code) = ward.code else {
            debug!("Skipping ward without code: {:?}", ward.name);
            report.skipped += 1;
            return Ok(());
        };

        let payload = encode(DivisionLevel::Ward, code, ward)?;
        self.write_record(DivisionLevel::Ward, code, ward.name.as_deref(), &payload, report)
            .await?;
        report.wards += 1;
        Ok(())
    }

    /// Write the record and add its code to the name index for its normalized name
    async fn write_record(
        &self,
        level: DivisionLevel,
        code: u32,
        name: Option<&str>,
        payload: &str,
        report: &mut LoadReport,
    ) -> LoadResult<()> {
        self.store
            .set_string(&CacheKey::division(level, code).to_string(), payload)
            .await?;

        match normalize(name).filter(|normalized| !normalized.is_empty()) {
            Some(normalized) => {
                self.store
                    .add_to_set(
                        &CacheKey::name_index(normalized).to_string(),
                        &code.to_string(),
                    )
                    .await?;
                report.index_entries += 1;
            }
            None => debug!("{} {} has no indexable name: {:?}", level, code, name),
        }

        Ok(())
    }

    async fn acquire_store_lock(&self) -> StoreResult<bool> {
        let key = CacheKey::LoadingLock.to_string();
        let lock = StoreLock {
            owner: self.instance_id,
            expires_at: lock_expiry(self.config.lock_ttl),
        };
        let value = serde_json::to_string(&lock)
            .map_err(|e| StoreError::write_failed(&key, e.to_string()))?;

        if self.store.set_if_absent(&key, &value).await? {
            return Ok(true);
        }

        let Some(raw) = self.store.get_string(&key).await? else {
            // Released between our two calls
            return self.store.set_if_absent(&key, &value).await;
        };

        match serde_json::from_str::<StoreLock>(&raw).ok() {
            Some(holder) if holder.expires_at > Utc::now() => {
                debug!(
                    "Load lock held by {} until {}",
                    holder.owner, holder.expires_at
                );
                Ok(false)
            }
            holder => {
                warn!(
                    "Taking over stale load lock (previous holder: {:?})",
                    holder.map(|h| h.owner)
                );
                // Only remove the exact stale value; a lock another process
                // just took over stays in place and we lose the race
                if !self.store.delete_if_equals(&key, &raw).await? {
                    debug!("Stale load lock changed before takeover");
                }
                self.store.set_if_absent(&key, &value).await
            }
        }
    }

    async fn release_store_lock(&self) -> StoreResult<()> {
        let key = CacheKey::LoadingLock.to_string();
        let Some(raw) = self.store.get_string(&key).await? else {
            return Ok(());
        };

        let ours = serde_json::from_str::<StoreLock>(&raw)
            .is_ok_and(|lock| lock.owner == self.instance_id);
        if ours {
            self.store.delete_if_equals(&key, &raw).await?;
        }
        Ok(())
    }
}

fn encode<T: Serialize>(level: DivisionLevel, code: u32, record: &T) -> LoadResult<String> {
    serde_json::to_string(record).map_err(|source| LoadError::Encode {
        level: level.to_string(),
        code,
        source,
    })
}

fn lock_expiry(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn failure_stage(error: &LoadError) -> &'static str {
    match error {
        LoadError::Upstream(_) => "fetch",
        LoadError::Store(_) => "store",
        LoadError::Encode { .. } => "encode",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::config::RetryConfig;
    use crate::errors::{UpstreamError, UpstreamResult};
    use crate::models::LoadState;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    struct FakeSource {
        provinces: Vec<Province>,
        failures_before_success: AtomicUsize,
        failure: fn() -> UpstreamError,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeSource {
        fn new(provinces: Vec<Province>) -> Self {
            Self {
                provinces,
                failures_before_success: AtomicUsize::new(0),
                failure: || UpstreamError::transport("http://upstream", "connection reset"),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn failing(self, times: usize, failure: fn() -> UpstreamError) -> Self {
            self.failures_before_success.store(times, Ordering::SeqCst);
            Self { failure, ..self }
        }

        /// Fail the next `times` fetches, e.g. after a good first load
        fn fail_next(&self, times: usize) {
            self.failures_before_success.store(times, Ordering::SeqCst);
        }

        fn slow(self, delay: Duration) -> Self {
            Self { delay, ..self }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DivisionSource for FakeSource {
        async fn fetch(&self) -> UpstreamResult<Vec<Province>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let remaining = self.failures_before_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_before_success
                    .store(remaining - 1, Ordering::SeqCst);
                return Err((self.failure)());
            }
            Ok(self.provinces.clone())
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    /// Store that rejects writes to keys with a given prefix
    struct FailingStore {
        inner: InMemoryCacheStore,
        fail_prefix: &'static str,
    }

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
            if key.starts_with(self.fail_prefix) {
                return Err(StoreError::write_failed(key, "disk full"));
            }
            self.inner.set_string(key, value).await
        }

        async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get_string(key).await
        }

        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.inner.exists(key).await
        }

        async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
            self.inner.add_to_set(key, member).await
        }

        async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>> {
            self.inner.set_members(key).await
        }

        async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
            self.inner.set_if_absent(key, value).await
        }

        async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
            self.inner.delete_if_equals(key, expected).await
        }
    }

    /// Store where another process takes over the stale load lock right
    /// after this one reads it
    struct ContendedLockStore {
        inner: InMemoryCacheStore,
        rival: String,
    }

    #[async_trait]
    impl CacheStore for ContendedLockStore {
        async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set_string(key, value).await
        }

        async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
            let seen = self.inner.get_string(key).await?;
            if key == "location:loading" {
                self.inner.set_string(key, &self.rival).await?;
            }
            Ok(seen)
        }

        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.inner.exists(key).await
        }

        async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
            self.inner.add_to_set(key, member).await
        }

        async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>> {
            self.inner.set_members(key).await
        }

        async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
            self.inner.set_if_absent(key, value).await
        }

        async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
            self.inner.delete_if_equals(key, expected).await
        }
    }

    fn ward(code: Option<u32>, name: &str, district_code: u32) -> Ward {
        Ward {
            code,
            name: Some(name.to_string()),
            division_type: Some("phường".to_string()),
            codename: None,
            district_code: Some(district_code),
        }
    }

    fn district(code: Option<u32>, name: &str, province_code: u32, wards: Vec<Ward>) -> District {
        District {
            code,
            name: Some(name.to_string()),
            division_type: Some("quận".to_string()),
            codename: None,
            province_code: Some(province_code),
            wards,
        }
    }

    fn province(code: Option<u32>, name: &str, districts: Vec<District>) -> Province {
        Province {
            code,
            name: Some(name.to_string()),
            division_type: Some("tỉnh".to_string()),
            codename: None,
            phone_code: None,
            districts,
        }
    }

    fn hanoi() -> Vec<Province> {
        vec![province(
            Some(1),
            "Hà Nội",
            vec![district(
                Some(101),
                "Cầu Giấy",
                1,
                vec![ward(Some(4), "Phường Phúc Xá", 101)],
            )],
        )]
    }

    fn loader_config() -> LoaderConfig {
        LoaderConfig {
            retry: RetryConfig::no_retry(),
            ..LoaderConfig::default()
        }
    }

    fn loader_with(
        source: Arc<FakeSource>,
        store: Arc<dyn CacheStore>,
        config: LoaderConfig,
    ) -> LocationCacheLoader {
        LocationCacheLoader::new(
            source,
            store,
            config,
            LoadStateManager::new(),
            LoaderMetrics::default(),
        )
    }

    #[tokio::test]
    async fn test_single_province_with_district() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(hanoi()));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        let LoadOutcome::Loaded(report) = loader.ensure_loaded().await.unwrap() else {
            panic!("expected a loaded outcome");
        };
        assert_eq!(report.provinces, 1);
        assert_eq!(report.districts, 1);
        assert_eq!(report.index_entries, 2);

        assert!(store.exists("province:code:1").await.unwrap());
        assert!(store.exists("district:code:101").await.unwrap());
        assert!(store
            .set_members("location:name:hanoi")
            .await
            .unwrap()
            .contains("1"));
        assert!(store
            .set_members("location:name:caugiay")
            .await
            .unwrap()
            .contains("101"));
        assert!(store.exists("location:loaded").await.unwrap());
        assert_eq!(loader.state_manager().state().await, LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_nested_layout_embeds_districts() {
        let store = InMemoryCacheStore::new();
        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store.clone()),
            loader_config(),
        );
        loader.ensure_loaded().await.unwrap();

        let raw = store.get_string("province:code:1").await.unwrap().unwrap();
        let cached: Province = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached.districts.len(), 1);
        assert_eq!(cached.districts[0].code, Some(101));
    }

    #[tokio::test]
    async fn test_flat_layout_strips_children() {
        let store = InMemoryCacheStore::new();
        let config = LoaderConfig {
            layout: PayloadLayout::Flat,
            ..loader_config()
        };
        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store.clone()),
            config,
        );
        loader.ensure_loaded().await.unwrap();

        let raw = store.get_string("province:code:1").await.unwrap().unwrap();
        let cached: Province = serde_json::from_str(&raw).unwrap();
        assert!(cached.districts.is_empty());

        let raw = store.get_string("district:code:101").await.unwrap().unwrap();
        let cached: District = serde_json::from_str(&raw).unwrap();
        assert!(cached.wards.is_empty());
    }

    #[tokio::test]
    async fn test_absent_codes_are_skipped() {
        let store = InMemoryCacheStore::new();
        let provinces = vec![
            province(
                None,
                "Vô Danh",
                vec![district(Some(999), "Bị Bỏ Qua", 0, Vec::new())],
            ),
            province(
                Some(48),
                "Đà Nẵng",
                vec![
                    district(None, "Không Mã", 48, Vec::new()),
                    district(Some(490), "Hải Châu", 48, Vec::new()),
                ],
            ),
        ];
        let loader = loader_with(
            Arc::new(FakeSource::new(provinces)),
            Arc::new(store.clone()),
            loader_config(),
        );

        let LoadOutcome::Loaded(report) = loader.ensure_loaded().await.unwrap() else {
            panic!("expected a loaded outcome");
        };
        assert_eq!(report.provinces, 1);
        assert_eq!(report.districts, 1);
        assert_eq!(report.skipped, 2);

        assert!(!store.exists("district:code:999").await.unwrap());
        assert!(!store.exists("location:name:vodanh").await.unwrap());
        assert!(!store.exists("location:name:khongma").await.unwrap());
        assert!(store.exists("province:code:48").await.unwrap());
        assert!(store.exists("district:code:490").await.unwrap());
        assert!(store
            .set_members("location:name:danang")
            .await
            .unwrap()
            .contains("48"));
        assert!(store.exists("location:loaded").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_call_does_not_fetch_or_write() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(hanoi()));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        loader.ensure_loaded().await.unwrap();
        let strings_after_first = store.string_count().await;
        let sets_after_first = store.set_count().await;

        let outcome = loader.ensure_loaded().await.unwrap();
        assert_eq!(outcome, LoadOutcome::AlreadyLoaded);
        assert_eq!(source.calls(), 1);
        assert_eq!(store.string_count().await, strings_after_first);
        assert_eq!(store.set_count().await, sets_after_first);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_guard_unset_and_next_call_retries() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(
            FakeSource::new(hanoi()).failing(1, || UpstreamError::Http {
                status: 502,
                url: "http://upstream".to_string(),
            }),
        );
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        let err = loader.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, LoadError::Upstream(UpstreamError::Http { status: 502, .. })));
        assert!(!store.exists("location:loaded").await.unwrap());
        assert!(!store.exists("location:loading").await.unwrap());
        let progress = loader.state_manager().get_progress().await;
        assert_eq!(progress.state, LoadState::Unloaded);
        assert!(progress.last_error.is_some());

        let outcome = loader.ensure_loaded().await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded(_)));
        assert_eq!(source.calls(), 2);
        assert!(store.exists("location:loaded").await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_policy_recovers_transient_failure() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(
            FakeSource::new(hanoi())
                .failing(2, || UpstreamError::timeout("http://upstream")),
        );
        let config = LoaderConfig {
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..LoaderConfig::default()
        };
        let loader = loader_with(source.clone(), Arc::new(store.clone()), config);

        assert!(matches!(
            loader.ensure_loaded().await.unwrap(),
            LoadOutcome::Loaded(_)
        ));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_wards_not_cached_by_default() {
        let store = InMemoryCacheStore::new();
        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store.clone()),
            loader_config(),
        );

        let LoadOutcome::Loaded(report) = loader.ensure_loaded().await.unwrap() else {
            panic!("expected a loaded outcome");
        };
        assert_eq!(report.wards, 0);
        assert!(!store.exists("ward:code:4").await.unwrap());
        assert!(!store.exists("location:name:phuongphucxa").await.unwrap());
    }

    #[tokio::test]
    async fn test_wards_cached_when_enabled() {
        let store = InMemoryCacheStore::new();
        let config = LoaderConfig {
            wards_enabled: true,
            ..loader_config()
        };
        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store.clone()),
            config,
        );

        let LoadOutcome::Loaded(report) = loader.ensure_loaded().await.unwrap() else {
            panic!("expected a loaded outcome");
        };
        assert_eq!(report.wards, 1);
        assert!(store.exists("ward:code:4").await.unwrap());
        assert!(store
            .set_members("location:name:phuongphucxa")
            .await
            .unwrap()
            .contains("4"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_empty_fetch_does_not_set_guard() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(Vec::new()));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        assert_eq!(loader.ensure_loaded().await.unwrap(), LoadOutcome::Empty);
        assert_eq!(store.string_count().await, 0);
        assert_eq!(store.set_count().await, 0);

        assert!(logs_contain("fetched no provinces"));

        loader.ensure_loaded().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_name_collisions_accumulate() {
        let store = InMemoryCacheStore::new();
        let provinces = vec![
            province(
                Some(1),
                "Hà Nội",
                vec![district(Some(5), "Ba Đình", 1, Vec::new())],
            ),
            province(
                Some(2),
                "Hà Giang",
                vec![district(Some(6), "Ba Đình", 2, Vec::new())],
            ),
        ];
        let loader = loader_with(
            Arc::new(FakeSource::new(provinces)),
            Arc::new(store.clone()),
            loader_config(),
        );
        loader.ensure_loaded().await.unwrap();

        let members = store.set_members("location:name:badinh").await.unwrap();
        assert_eq!(
            members.into_iter().collect::<Vec<_>>(),
            vec!["5".to_string(), "6".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unindexable_name_still_cached() {
        let store = InMemoryCacheStore::new();
        let provinces = vec![province(Some(77), "???", Vec::new())];
        let loader = loader_with(
            Arc::new(FakeSource::new(provinces)),
            Arc::new(store.clone()),
            loader_config(),
        );

        let LoadOutcome::Loaded(report) = loader.ensure_loaded().await.unwrap() else {
            panic!("expected a loaded outcome");
        };
        assert_eq!(report.index_entries, 0);
        assert!(store.exists("province:code:77").await.unwrap());
        assert!(!store.exists("location:name:").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_leaves_guard_unset() {
        let inner = InMemoryCacheStore::new();
        let store = FailingStore {
            inner: inner.clone(),
            fail_prefix: "district:",
        };
        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store),
            loader_config(),
        );

        let err = loader.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, LoadError::Store(StoreError::WriteFailed { .. })));
        assert!(!inner.exists("location:loaded").await.unwrap());
        assert!(!inner.exists("location:loading").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_callers_fetch_once() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(hanoi()).slow(Duration::from_millis(50)));
        let loader = Arc::new(loader_with(
            source.clone(),
            Arc::new(store.clone()),
            loader_config(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.ensure_loaded().await })
            })
            .collect();

        let mut loaded = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                LoadOutcome::Loaded(_) => loaded += 1,
                LoadOutcome::AlreadyLoaded => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(loaded, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_lock_held_elsewhere() {
        let store = InMemoryCacheStore::new();
        let foreign = StoreLock {
            owner: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        };
        store
            .set_string("location:loading", &serde_json::to_string(&foreign).unwrap())
            .await
            .unwrap();

        let source = Arc::new(FakeSource::new(hanoi()));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        assert_eq!(
            loader.ensure_loaded().await.unwrap(),
            LoadOutcome::InProgressElsewhere
        );
        assert_eq!(source.calls(), 0);
        assert!(store.exists("location:loading").await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let store = InMemoryCacheStore::new();
        let stale = StoreLock {
            owner: Uuid::new_v4(),
            expires_at: Utc::now() - chrono::Duration::minutes(1),
        };
        store
            .set_string("location:loading", &serde_json::to_string(&stale).unwrap())
            .await
            .unwrap();

        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store.clone()),
            loader_config(),
        );

        assert!(matches!(
            loader.ensure_loaded().await.unwrap(),
            LoadOutcome::Loaded(_)
        ));
        assert!(!store.exists("location:loading").await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_disabled_ignores_foreign_lock() {
        let store = InMemoryCacheStore::new();
        store
            .set_string("location:loading", "held by someone")
            .await
            .unwrap();
        let config = LoaderConfig {
            distributed_lock: false,
            ..loader_config()
        };
        let loader = loader_with(
            Arc::new(FakeSource::new(hanoi())),
            Arc::new(store.clone()),
            config,
        );

        assert!(matches!(
            loader.ensure_loaded().await.unwrap(),
            LoadOutcome::Loaded(_)
        ));
        assert!(store.exists("location:loading").await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_rebuilds() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(hanoi()));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        loader.ensure_loaded().await.unwrap();
        let outcome = loader.refresh().await.unwrap();

        assert!(matches!(outcome, LoadOutcome::Loaded(_)));
        assert_eq!(source.calls(), 2);
        assert!(store.exists("location:loaded").await.unwrap());
        assert!(store.exists("province:code:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_generation() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(hanoi()).failing(0, || UpstreamError::Http {
            url: "http://upstream".to_string(),
            status: 503,
        }));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());

        loader.ensure_loaded().await.unwrap();
        let guard_before = store.get_string("location:loaded").await.unwrap();

        source.fail_next(1);
        assert!(loader.refresh().await.is_err());

        assert_eq!(source.calls(), 2);
        assert_eq!(
            store.get_string("location:loaded").await.unwrap(),
            guard_before
        );
        assert!(store.exists("province:code:1").await.unwrap());
        let progress = loader.state_manager().get_progress().await;
        assert_eq!(progress.state, LoadState::Loaded);
        assert!(progress.last_error.is_some());

        // Readers still short-circuit on the old generation
        assert_eq!(
            loader.ensure_loaded().await.unwrap(),
            LoadOutcome::AlreadyLoaded
        );
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_respects_foreign_lock() {
        let store = InMemoryCacheStore::new();
        let source = Arc::new(FakeSource::new(hanoi()));
        let loader = loader_with(source.clone(), Arc::new(store.clone()), loader_config());
        loader.ensure_loaded().await.unwrap();

        let foreign = StoreLock {
            owner: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        };
        store
            .set_string("location:loading", &serde_json::to_string(&foreign).unwrap())
            .await
            .unwrap();

        assert_eq!(
            loader.refresh().await.unwrap(),
            LoadOutcome::InProgressElsewhere
        );
        assert_eq!(source.calls(), 1);
        assert!(store.exists("location:loaded").await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_lock_taken_over_by_rival_is_left_alone() {
        let inner = InMemoryCacheStore::new();
        let stale = StoreLock {
            owner: Uuid::new_v4(),
            expires_at: Utc::now() - chrono::Duration::minutes(1),
        };
        inner
            .set_string("location:loading", &serde_json::to_string(&stale).unwrap())
            .await
            .unwrap();
        let rival = serde_json::to_string(&StoreLock {
            owner: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        })
        .unwrap();
        let store = ContendedLockStore {
            inner: inner.clone(),
            rival: rival.clone(),
        };

        let source = Arc::new(FakeSource::new(hanoi()));
        let loader = loader_with(source.clone(), Arc::new(store), loader_config());

        assert_eq!(
            loader.ensure_loaded().await.unwrap(),
            LoadOutcome::InProgressElsewhere
        );
        assert_eq!(source.calls(), 0);
        assert_eq!(
            inner.get_string("location:loading").await.unwrap(),
            Some(rival)
        );
    }
}
