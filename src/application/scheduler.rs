//! Background refresh jobs.
//!
//! Two independent timers: the full cache refresh and the staking-groups
//! refresh. Each job keeps at most one run in flight; a tick that arrives
//! while the previous run is still going is skipped.

use crate::application::MetricsService;
use crate::config::SchedulerConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshJob {
    Cache,
    Staking,
}

impl RefreshJob {
    pub fn name(self) -> &'static str {
        match self {
            RefreshJob::Cache => "cache-refresh",
            RefreshJob::Staking => "staking-refresh",
        }
    }
}

/// Run one job to completion, logging and counting the outcome.
pub async fn run_once(job: RefreshJob, service: &MetricsService) -> bool {
    let started = Instant::now();
    info!("Starting {}", job.name());

    let result = match job {
        RefreshJob::Cache => service.refresh_all().await,
        RefreshJob::Staking => service.refresh_staking().await,
    };

    match result {
        Ok(groups) => {
            info!(
                "{} completed: {} groups in {:.1}s",
                job.name(),
                groups,
                started.elapsed().as_secs_f64()
            );
            metrics::counter!("refresh_runs_total", "job" => job.name(), "outcome" => "ok").increment(1);
            true
        }
        Err(e) => {
            error!("{} failed: {:#}", job.name(), e);
            metrics::counter!("refresh_runs_total", "job" => job.name(), "outcome" => "error").increment(1);
            false
        }
    }
}

pub struct Scheduler {
    service: Arc<MetricsService>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(service: Arc<MetricsService>, config: SchedulerConfig) -> Self {
        Self { service, config }
    }

    /// Spawn both jobs. Abort the returned handles to stop them.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let jobs = [
            (RefreshJob::Cache, self.config.cache_refresh_interval_secs),
            (RefreshJob::Staking, self.config.staking_refresh_interval_secs),
        ];
        jobs.into_iter()
            .map(|(job, secs)| {
                let service = self.service.clone();
                let run_on_startup = self.config.run_on_startup;
                tokio::spawn(job_loop(job, service, Duration::from_secs(secs.max(1)), run_on_startup))
            })
            .collect()
    }
}

async fn job_loop(job: RefreshJob, service: Arc<MetricsService>, period: Duration, run_on_startup: bool) {
    info!("{} scheduled every {}s", job.name(), period.as_secs());
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if !run_on_startup {
        // The first tick completes immediately
        ticker.tick().await;
    }

    // Dropped with the loop, which aborts a run still in flight
    let mut running = JoinSet::new();
    loop {
        ticker.tick().await;

        while running.try_join_next().is_some() {}
        if !running.is_empty() {
            warn!("{} still running, skipping this tick", job.name());
            metrics::counter!("refresh_runs_total", "job" => job.name(), "outcome" => "skipped").increment(1);
            continue;
        }

        let service = service.clone();
        running.spawn(async move {
            run_once(job, &service).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{Adapters, MetricsSettings};
    use crate::domain::{
        AdapterError, AdapterResult, EmissionDay, MockChainSource, MockHolderSource, MockLiquiditySource,
        MockLockedBurnedSource, MockMarketSource, MockStakingLedger, MockSupplyLedger, StakeEvent, StakingLedger,
    };
    use crate::infrastructure::MemoryCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stake events arrive 25s after they are asked for.
    #[derive(Default)]
    struct SlowLedger {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl StakingLedger for SlowLedger {
        async fn read_stake_events(&self) -> AdapterResult<Vec<StakeEvent>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(25)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn read_emission_schedule(&self) -> AdapterResult<Vec<EmissionDay>> {
            Ok(vec![])
        }
    }

    fn service_with_staking(staking: Arc<dyn StakingLedger>) -> Arc<MetricsService> {
        let adapters = Adapters {
            chain: Arc::new(MockChainSource::new()),
            market: Arc::new(MockMarketSource::new()),
            holders: Arc::new(MockHolderSource::new()),
            supply_ledger: Arc::new(MockSupplyLedger::new()),
            staking,
            locked_burned: Arc::new(MockLockedBurnedSource::new()),
            liquidity: Arc::new(MockLiquiditySource::new()),
        };
        Arc::new(MetricsService::new(adapters, Arc::new(MemoryCache::new()), MetricsSettings::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn busy_job_skips_ticks_and_abort_stops_the_run() {
        let ledger = Arc::new(SlowLedger::default());
        let service = service_with_staking(ledger.clone());
        let job = tokio::spawn(job_loop(RefreshJob::Staking, service, Duration::from_secs(10), true));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let per_run = ledger.started.load(Ordering::SeqCst);
        assert!(per_run > 0);

        // Ticks at 10s and 20s land while the first run is still reading
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ledger.started.load(Ordering::SeqCst), per_run);
        assert_eq!(ledger.finished.load(Ordering::SeqCst), 0);

        // First run done at 25s, the 30s tick starts the second
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ledger.finished.load(Ordering::SeqCst), per_run);
        assert_eq!(ledger.started.load(Ordering::SeqCst), 2 * per_run);

        job.abort();
        let _ = job.await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ledger.finished.load(Ordering::SeqCst), per_run);
    }

    #[tokio::test(start_paused = true)]
    async fn without_startup_run_first_run_waits_one_period() {
        let ledger = Arc::new(SlowLedger::default());
        let service = service_with_staking(ledger.clone());
        let job = tokio::spawn(job_loop(RefreshJob::Staking, service, Duration::from_secs(10), false));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ledger.started.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(ledger.started.load(Ordering::SeqCst) > 0);
        job.abort();
    }

    #[test]
    fn job_names() {
        assert_eq!(RefreshJob::Cache.name(), "cache-refresh");
        assert_eq!(RefreshJob::Staking.name(), "staking-refresh");
    }

    #[tokio::test]
    async fn failed_run_reports_false_and_leaves_cache_alone() {
        let mut staking = MockStakingLedger::new();
        staking
            .expect_read_stake_events()
            .returning(|| Err(AdapterError::decode("truncated csv")));
        staking.expect_read_emission_schedule().returning(|| Ok(vec![]));

        let adapters = Adapters {
            chain: Arc::new(MockChainSource::new()),
            market: Arc::new(MockMarketSource::new()),
            holders: Arc::new(MockHolderSource::new()),
            supply_ledger: Arc::new(MockSupplyLedger::new()),
            staking: Arc::new(staking),
            locked_burned: Arc::new(MockLockedBurnedSource::new()),
            liquidity: Arc::new(MockLiquiditySource::new()),
        };
        let cache = Arc::new(MemoryCache::new());
        let service = MetricsService::new(adapters, cache.clone(), MetricsSettings::default());

        assert!(!run_once(RefreshJob::Staking, &service).await);
        assert_eq!(service.cached_group_count().await, 0);
    }
}
