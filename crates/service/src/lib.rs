//! Cache-first orchestration over the biorhythm API.
//!
//! `DataService` sits between the rendering layer and the remote API:
//! reads consult the TTL cache first, misses fall through to the client,
//! and recalculation triggers invalidate everything cached for the person.
//! Cache failures are never fatal — the fetched value is still returned
//! and the failure is reported as a warning.

mod keys;

use std::time::Duration;

use chrono::NaiveDate;
use common::{ApiInfo, BiorhythmSeries, CalculationAck, Error, Person};
use stats::{Correlation, SeriesStats};
use tracing::{debug, warn};
use ttl_cache::SharedCache;

use biorhythm_client::BiorhythmClient;

/// API surface the service depends on. `BiorhythmClient` is the production
/// implementation; tests substitute call-counting mocks.
#[allow(async_fn_in_trait)]
pub trait BiorhythmApi {
    async fn fetch_api_info(&self) -> Result<ApiInfo, Error>;
    async fn fetch_person(&self, id: u64) -> Result<Person, Error>;
    async fn fetch_people(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Person>, Error>;
    async fn fetch_biorhythm_series(
        &self,
        person_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
    ) -> Result<BiorhythmSeries, Error>;
    async fn trigger_calculation(
        &self,
        person_id: u64,
        days: u32,
        notes: &str,
    ) -> Result<CalculationAck, Error>;
}

impl BiorhythmApi for BiorhythmClient {
    async fn fetch_api_info(&self) -> Result<ApiInfo, Error> {
        BiorhythmClient::fetch_api_info(self).await
    }

    async fn fetch_person(&self, id: u64) -> Result<Person, Error> {
        BiorhythmClient::fetch_person(self, id).await
    }

    async fn fetch_people(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Person>, Error> {
        BiorhythmClient::fetch_people(self, search, limit).await
    }

    async fn fetch_biorhythm_series(
        &self,
        person_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
    ) -> Result<BiorhythmSeries, Error> {
        BiorhythmClient::fetch_biorhythm_series(self, person_id, start_date, end_date, limit).await
    }

    async fn trigger_calculation(
        &self,
        person_id: u64,
        days: u32,
        notes: &str,
    ) -> Result<CalculationAck, Error> {
        BiorhythmClient::trigger_calculation(self, person_id, days, notes).await
    }
}

/// Payloads storable in the shared cache. Entries are immutable
/// replacements — a refetch swaps the whole value.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Person(Person),
    People(Vec<Person>),
    Series(BiorhythmSeries),
    Summary(SeriesSummary),
}

/// Derived statistics bundle, cached independently of the series it came
/// from (at twice the default TTL — it changes less often than raw reads).
#[derive(Debug, Clone, Copy)]
pub struct SeriesSummary {
    pub stats: Option<SeriesStats>,
    pub correlation: Correlation,
}

/// Orchestrator holding the injected client, cache, and default TTL.
/// Constructed once at startup and owned by the binary — no globals.
pub struct DataService<A> {
    api: A,
    cache: SharedCache<CachedValue>,
    ttl: Duration,
}

impl<A: BiorhythmApi> DataService<A> {
    pub fn new(api: A, cache: SharedCache<CachedValue>, ttl: Duration) -> Self {
        Self { api, cache, ttl }
    }

    /// Uncached connectivity probe.
    pub async fn api_status(&self) -> Result<ApiInfo, Error> {
        self.api.fetch_api_info().await
    }

    pub async fn get_person(&self, id: u64, fresh: bool) -> Result<Person, Error> {
        let key = keys::person(id);
        if !fresh {
            if let Some(CachedValue::Person(person)) = self.cache_get(&key) {
                debug!("cache hit: {key}");
                return Ok(person);
            }
        }
        let person = self.api.fetch_person(id).await?;
        self.cache_put(&key, CachedValue::Person(person.clone()), self.ttl);
        Ok(person)
    }

    /// People list. Only the unfiltered, unlimited list is cached; search
    /// results always go to the API.
    pub async fn get_people(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
        fresh: bool,
    ) -> Result<Vec<Person>, Error> {
        let cacheable = search.is_none() && limit.is_none();
        let key = keys::people();
        if cacheable && !fresh {
            if let Some(CachedValue::People(people)) = self.cache_get(&key) {
                debug!("cache hit: {key}");
                return Ok(people);
            }
        }
        let people = self.api.fetch_people(search, limit).await?;
        if cacheable {
            self.cache_put(&key, CachedValue::People(people.clone()), self.ttl);
        }
        Ok(people)
    }

    pub async fn get_biorhythm(
        &self,
        person_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
        fresh: bool,
    ) -> Result<BiorhythmSeries, Error> {
        let key = keys::series(person_id, start_date, end_date, limit);
        if !fresh {
            if let Some(CachedValue::Series(series)) = self.cache_get(&key) {
                debug!("cache hit: {key}");
                return Ok(series);
            }
        }
        let series = self
            .api
            .fetch_biorhythm_series(person_id, start_date, end_date, limit)
            .await?;
        self.cache_put(&key, CachedValue::Series(series.clone()), self.ttl);
        Ok(series)
    }

    /// Derived statistics for a series window, cached at twice the default
    /// TTL under an independent key.
    pub async fn get_statistics(
        &self,
        person_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
        fresh: bool,
    ) -> Result<SeriesSummary, Error> {
        let key = keys::stats(person_id, start_date, end_date, limit);
        if !fresh {
            if let Some(CachedValue::Summary(summary)) = self.cache_get(&key) {
                debug!("cache hit: {key}");
                return Ok(summary);
            }
        }
        let series = self
            .get_biorhythm(person_id, start_date, end_date, limit, fresh)
            .await?;
        let summary = SeriesSummary {
            stats: stats::describe(&series),
            correlation: stats::correlate(&series),
        };
        self.cache_put(&key, CachedValue::Summary(summary), self.ttl * 2);
        Ok(summary)
    }

    /// Trigger a remote recalculation, then drop every cached entry for
    /// the person plus the people list.
    ///
    /// Invalidation runs only after the remote call succeeds; a read
    /// racing between remote success and invalidation may observe one
    /// final stale hit.
    pub async fn calculate_and_invalidate(
        &self,
        person_id: u64,
        days: u32,
        notes: &str,
    ) -> Result<CalculationAck, Error> {
        let ack = self.api.trigger_calculation(person_id, days, notes).await?;
        for prefix in [keys::person_prefix(person_id), keys::people_prefix()] {
            match self.cache.invalidate(&prefix) {
                Ok(removed) => debug!("invalidated {removed} cache entries under {prefix}"),
                Err(e) => warn!("cache invalidation failed for {prefix}: {e}"),
            }
        }
        Ok(ack)
    }

    fn cache_get(&self, key: &str) -> Option<CachedValue> {
        match self.cache.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("cache lookup failed for {key}: {e}");
                None
            }
        }
    }

    fn cache_put(&self, key: &str, value: CachedValue, ttl: Duration) {
        if let Err(e) = self.cache.set(key, value, ttl) {
            warn!("cache population failed for {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::BiorhythmPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use ttl_cache::{CacheStore, ManualClock, MemoryCache};

    const TTL: Duration = Duration::from_secs(300);

    #[derive(Default)]
    struct Calls {
        person: AtomicUsize,
        people: AtomicUsize,
        series: AtomicUsize,
        calc: AtomicUsize,
    }

    struct MockApi {
        calls: Arc<Calls>,
        fail_series: bool,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                calls: Arc::new(Calls::default()),
                fail_series: false,
            }
        }

        fn failing_series() -> Self {
            Self {
                calls: Arc::new(Calls::default()),
                fail_series: true,
            }
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn sample_series(person_id: u64) -> BiorhythmSeries {
        BiorhythmSeries {
            person_id,
            points: vec![
                BiorhythmPoint {
                    date: day(1),
                    physical: 0.5,
                    emotional: 0.1,
                    intellectual: -0.3,
                },
                BiorhythmPoint {
                    date: day(2),
                    physical: -0.5,
                    emotional: 0.2,
                    intellectual: 0.3,
                },
            ],
        }
    }

    impl BiorhythmApi for MockApi {
        async fn fetch_api_info(&self) -> Result<ApiInfo, Error> {
            Ok(ApiInfo {
                api_name: "mock".into(),
                version: "1".into(),
            })
        }

        async fn fetch_person(&self, id: u64) -> Result<Person, Error> {
            self.calls.person.fetch_add(1, Ordering::SeqCst);
            Ok(Person {
                id,
                name: format!("person-{id}"),
                birthdate: None,
            })
        }

        async fn fetch_people(
            &self,
            _search: Option<&str>,
            _limit: Option<u32>,
        ) -> Result<Vec<Person>, Error> {
            self.calls.people.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Person {
                id: 1,
                name: "person-1".into(),
                birthdate: None,
            }])
        }

        async fn fetch_biorhythm_series(
            &self,
            person_id: u64,
            _start_date: NaiveDate,
            _end_date: NaiveDate,
            _limit: u32,
        ) -> Result<BiorhythmSeries, Error> {
            self.calls.series.fetch_add(1, Ordering::SeqCst);
            if self.fail_series {
                return Err(Error::RetriesExhausted {
                    attempts: 3,
                    last: Box::new(Error::Network("connect timeout".into())),
                });
            }
            Ok(sample_series(person_id))
        }

        async fn trigger_calculation(
            &self,
            _person_id: u64,
            _days: u32,
            _notes: &str,
        ) -> Result<CalculationAck, Error> {
            self.calls.calc.fetch_add(1, Ordering::SeqCst);
            Ok(CalculationAck {
                calculation_id: Some(42),
                data_points_created: 365,
            })
        }
    }

    /// Cache whose every operation fails, for degraded-mode tests.
    struct FailingCache;

    impl CacheStore<CachedValue> for FailingCache {
        fn get(&self, _key: &str) -> Result<Option<CachedValue>, Error> {
            Err(Error::CacheUnavailable("store offline".into()))
        }
        fn set(&self, _key: &str, _value: CachedValue, _ttl: Duration) -> Result<(), Error> {
            Err(Error::CacheUnavailable("store offline".into()))
        }
        fn invalidate(&self, _prefix: &str) -> Result<usize, Error> {
            Err(Error::CacheUnavailable("store offline".into()))
        }
        fn invalidate_all(&self) -> Result<(), Error> {
            Err(Error::CacheUnavailable("store offline".into()))
        }
    }

    fn build(
        api: MockApi,
    ) -> (
        DataService<MockApi>,
        Arc<Calls>,
        Arc<ManualClock>,
        Arc<MemoryCache<CachedValue>>,
    ) {
        let calls = api.calls.clone();
        let clock = ManualClock::new();
        let cache = Arc::new(MemoryCache::with_clock(clock.clone()));
        let shared: SharedCache<CachedValue> = cache.clone();
        let service = DataService::new(api, shared, TTL);
        (service, calls, clock, cache)
    }

    #[tokio::test]
    async fn second_read_within_ttl_hits_the_cache() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        let first = service
            .get_biorhythm(1, day(1), day(2), 100, false)
            .await
            .unwrap();
        let second = service
            .get_biorhythm(1, day(1), day(2), 100, false)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.series.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_read_bypasses_and_repopulates_the_cache() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        service.get_biorhythm(1, day(1), day(2), 100, false).await.unwrap();
        service.get_biorhythm(1, day(1), day(2), 100, true).await.unwrap();
        assert_eq!(calls.series.load(Ordering::SeqCst), 2);

        // The forced fetch refreshed the entry, so the next read hits.
        service.get_biorhythm(1, day(1), day(2), 100, false).await.unwrap();
        assert_eq!(calls.series.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ttl_expiry_forces_a_refetch() {
        let (service, calls, clock, _cache) = build(MockApi::new());

        service.get_person(1, false).await.unwrap();
        clock.advance(TTL);
        service.get_person(1, false).await.unwrap();

        assert_eq!(calls.person.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_parameters_do_not_share_entries() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        service.get_biorhythm(1, day(1), day(2), 100, false).await.unwrap();
        service.get_biorhythm(1, day(1), day(2), 50, false).await.unwrap();

        assert_eq!(calls.series.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn calculate_invalidates_person_entries_inside_ttl() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        service.get_person(1, false).await.unwrap();
        service.get_biorhythm(1, day(1), day(2), 100, false).await.unwrap();
        service.get_person(2, false).await.unwrap();

        let ack = service.calculate_and_invalidate(1, 365, "").await.unwrap();
        assert_eq!(ack.data_points_created, 365);
        assert_eq!(calls.calc.load(Ordering::SeqCst), 1);

        // Person 1 entries are gone even though the TTL has not expired.
        service.get_person(1, false).await.unwrap();
        service.get_biorhythm(1, day(1), day(2), 100, false).await.unwrap();
        assert_eq!(calls.person.load(Ordering::SeqCst), 3);
        assert_eq!(calls.series.load(Ordering::SeqCst), 2);

        // Person 2 was untouched.
        service.get_person(2, false).await.unwrap();
        assert_eq!(calls.person.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn calculate_invalidates_the_people_list() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        service.get_people(None, None, false).await.unwrap();
        service.get_people(None, None, false).await.unwrap();
        assert_eq!(calls.people.load(Ordering::SeqCst), 1);

        service.calculate_and_invalidate(1, 30, "refresh").await.unwrap();
        service.get_people(None, None, false).await.unwrap();
        assert_eq!(calls.people.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn filtered_people_queries_are_never_cached() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        service.get_people(Some("ada"), None, false).await.unwrap();
        service.get_people(Some("ada"), None, false).await.unwrap();
        assert_eq!(calls.people.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing_to_the_cache() {
        let (service, calls, _clock, cache) = build(MockApi::failing_series());

        let result = service.get_biorhythm(1, day(1), day(2), 100, false).await;
        match result {
            Err(Error::RetriesExhausted { last, .. }) => {
                assert!(matches!(*last, Error::Network(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls.series.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn unavailable_cache_degrades_to_fetch_through() {
        let api = MockApi::new();
        let calls = api.calls.clone();
        let failing: SharedCache<CachedValue> = Arc::new(FailingCache);
        let service = DataService::new(api, failing, TTL);

        let person = service.get_person(1, false).await.unwrap();
        assert_eq!(person.id, 1);
        service.get_person(1, false).await.unwrap();
        // No cache, so every read goes to the API — but reads still succeed.
        assert_eq!(calls.person.load(Ordering::SeqCst), 2);

        // Invalidation failures are also non-fatal.
        service.calculate_and_invalidate(1, 30, "").await.unwrap();
    }

    #[tokio::test]
    async fn statistics_are_cached_independently_at_double_ttl() {
        let (service, calls, clock, _cache) = build(MockApi::new());

        let summary = service
            .get_statistics(1, day(1), day(2), 100, false)
            .await
            .unwrap();
        assert!(summary.stats.is_some());
        assert_eq!(calls.series.load(Ordering::SeqCst), 1);

        // Past the series TTL but inside the stats TTL: the summary is
        // still served without refetching the series.
        clock.advance(TTL + Duration::from_secs(1));
        service.get_statistics(1, day(1), day(2), 100, false).await.unwrap();
        assert_eq!(calls.series.load(Ordering::SeqCst), 1);

        // Past the stats TTL too: everything is recomputed.
        clock.advance(TTL);
        service.get_statistics(1, day(1), day(2), 100, false).await.unwrap();
        assert_eq!(calls.series.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fresh_statistics_bypass_the_cached_summary() {
        let (service, calls, _clock, _cache) = build(MockApi::new());

        service.get_statistics(1, day(1), day(2), 100, false).await.unwrap();
        assert_eq!(calls.series.load(Ordering::SeqCst), 1);

        // Both the summary and the series are inside their TTLs, but a
        // forced refresh recomputes from newly fetched points.
        let summary = service
            .get_statistics(1, day(1), day(2), 100, true)
            .await
            .unwrap();
        assert!(summary.stats.is_some());
        assert_eq!(calls.series.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn statistics_reflect_the_fetched_series() {
        let (service, _calls, _clock, _cache) = build(MockApi::new());

        let summary = service
            .get_statistics(1, day(1), day(2), 100, false)
            .await
            .unwrap();
        let stats = summary.stats.unwrap();
        assert_eq!(stats.physical.mean, 0.0);
        assert_eq!(stats.physical.count, 2);
        assert!(matches!(summary.correlation, Correlation::Matrix(_)));
    }
}
