use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use super::monitor::completion_channel;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::*;
use crate::pipeline::ConversionPipeline;
use crate::playlist::PlaylistGenerator;
use crate::sources::EpgFetcher;
use crate::utils::human_format::format_duration;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Daily refresh cycle: playlist, fetch, convert, then sleep until a random
/// instant inside tomorrow's window
///
/// Exclusivity is structural: every transition takes `&mut self` and the
/// state guard rejects a second cycle while one is in flight.
pub struct CycleScheduler {
    fetcher: Arc<dyn EpgFetcher>,
    pipeline: Arc<ConversionPipeline>,
    playlist: PlaylistGenerator,
    window: ScheduleWindow,
    timezone: Tz,
    lookahead_days: u32,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
    state: CycleState,
    metrics: Metrics,
    plan: Option<RunPlan>,
    trigger: Option<Pin<Box<Sleep>>>,
}

impl CycleScheduler {
    pub fn new(config: &Config, fetcher: Arc<dyn EpgFetcher>) -> AppResult<Self> {
        let catalog = Arc::new(config.catalog());
        let pipeline = ConversionPipeline::new(
            catalog.clone(),
            config.artifacts.clone(),
            config.normalize_settings()?,
        );
        let playlist = PlaylistGenerator::new(
            catalog,
            config.playlist.uri_prefix.clone(),
            config.playlist.tags.clone(),
            config.playlist.path.clone(),
        );

        Ok(Self {
            fetcher,
            pipeline: Arc::new(pipeline),
            playlist,
            window: config.window(),
            timezone: config.timezone()?,
            lookahead_days: config.lookahead_days(),
            clock: Box::new(SystemClock),
            rng: Box::new(StdRng::from_os_rng()),
            state: CycleState::Idle,
            metrics: Metrics::default(),
            plan: None,
            trigger: None,
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn plan(&self) -> Option<RunPlan> {
        self.plan
    }

    pub fn is_armed(&self) -> bool {
        self.trigger.is_some()
    }

    /// Start a cycle: reset metrics, regenerate the playlist, enter `Fetching`
    pub fn begin_cycle(&mut self) -> AppResult<DateRange> {
        if self.state.is_busy() {
            return Err(AppError::operation_in_progress(
                "refresh cycle",
                self.state.to_string(),
            ));
        }

        self.metrics = Metrics::default();

        if let Err(e) = self.playlist.write() {
            error!("Failed to write playlist: {}", e);
        }

        let today = self.clock.now().with_timezone(&self.timezone).date_naive();
        let range = DateRange::from_today(today, self.lookahead_days);
        self.transition(CycleState::Fetching);
        Ok(range)
    }

    /// Run one complete cycle and return the settled state
    ///
    /// Every failure past `begin_cycle` is cycle-local and ends in
    /// `Settled(Failed)`.
    pub async fn run_cycle(&mut self) -> AppResult<CycleState> {
        let range = self.begin_cycle()?;
        info!(
            "Fetching EPG {} to {} ({} days) from {}",
            range.start,
            range.end,
            range.days(),
            self.fetcher.describe()
        );

        let raw = match self.fetcher.fetch_epg(&range).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("EPG fetch failed: {}", e);
                self.transition(CycleState::Settled(CycleOutcome::Failed));
                return Ok(self.state);
            }
        };
        info!("Fetched {} bytes of EPG", raw.len());

        if self.fetcher.persists_raw() {
            let raw_path = self.pipeline.artifacts().raw_path.clone();
            if let Err(e) = write_raw_artifact(&raw_path, &raw).await {
                error!("Failed to write raw EPG: {}", e);
                self.transition(CycleState::Settled(CycleOutcome::Failed));
                return Ok(self.state);
            }
            debug!("Raw EPG written to {}", raw_path.display());
        }

        self.transition(CycleState::Converting);
        let (signal, monitor) = completion_channel();
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            match pipeline.run(raw).await {
                Ok(metrics) => signal.settle(CycleOutcome::Ok, metrics),
                Err(e) => {
                    error!("Conversion failed in {} stage: {}", e.stage(), e);
                    signal.settle(CycleOutcome::Failed, Metrics::default());
                }
            }
        });

        let (state, metrics) = monitor.await_settlement().await;
        self.metrics = metrics;
        self.transition(state);
        info!(
            "Cycle {}: {} channels, {} programmes",
            state, metrics.channel_count, metrics.programme_count
        );
        Ok(state)
    }

    /// Draw the next run uniformly from tomorrow's window
    pub fn compute_next_plan(&mut self) -> RunPlan {
        let now = self.clock.now();
        let today = now.with_timezone(&self.timezone).date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);

        let (start, end) = self.window.bounds_on(tomorrow, self.timezone);
        let span_ms = (end - start).num_milliseconds();
        let offset_ms = if span_ms > 0 {
            self.rng.random_range(0..span_ms)
        } else {
            0
        };
        let next_run_at = start.with_timezone(&Utc) + Duration::milliseconds(offset_ms);

        let plan = RunPlan::new(next_run_at, now);
        if plan.next_run_at != next_run_at {
            warn!(
                "Next run {} was already in the past, moved to {}",
                next_run_at, plan.next_run_at
            );
        }
        info!(
            "Next cycle at {} (in {})",
            plan.next_run_at.with_timezone(&self.timezone),
            format_duration(plan.remaining_ms.max(0) as u64)
        );
        plan
    }

    /// Arm the one-shot trigger, cancelling any previously armed one
    pub fn arm_trigger(&mut self, plan: RunPlan) -> AppResult<()> {
        if self.state.is_busy() {
            return Err(AppError::operation_in_progress(
                "arm trigger",
                self.state.to_string(),
            ));
        }
        if self.trigger.is_some() {
            debug!("Replacing previously armed trigger");
        }
        self.trigger = Some(Box::pin(tokio::time::sleep(plan.remaining())));
        self.plan = Some(plan);
        Ok(())
    }

    /// Wait for the armed trigger to fire; the trigger is consumed
    pub async fn wait_for_trigger(&mut self) -> AppResult<()> {
        let trigger = self
            .trigger
            .as_mut()
            .ok_or_else(|| AppError::internal("No trigger armed"))?;
        trigger.await;
        self.trigger = None;
        debug!("Trigger fired");
        Ok(())
    }

    /// Run cycles forever, starting immediately
    pub async fn run(&mut self) -> AppResult<()> {
        info!(
            "Starting scheduler: window {:02}:00-{:02}:00 {}, {} days lookahead",
            self.window.start_hour, self.window.end_hour, self.timezone, self.lookahead_days
        );
        loop {
            if let Err(e) = self.run_cycle().await {
                warn!("Cycle not started: {}", e);
            }
            let plan = self.compute_next_plan();
            self.arm_trigger(plan)?;
            self.wait_for_trigger().await?;
        }
    }

    fn transition(&mut self, next: CycleState) {
        debug!("Cycle state {} -> {}", self.state, next);
        self.state = next;
    }
}

async fn write_raw_artifact(path: &Path, raw: &str) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::io(parent, e))?;
    }
    tokio::fs::write(path, raw)
        .await
        .map_err(|e| AppError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Timelike};
    use proptest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct CannedFetcher(Option<&'static str>);

    #[async_trait]
    impl EpgFetcher for CannedFetcher {
        async fn fetch_epg(&self, _range: &DateRange) -> Result<String, FetchError> {
            match self.0 {
                Some(body) => Ok(body.to_string()),
                None => Err(FetchError::Http {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                }),
            }
        }

        fn describe(&self) -> String {
            "canned".to_string()
        }
    }

    const EXPORT: &str = r#"<export>
  <pase cadena="TVE" fecha="2026-10-16"><hora>21:00</hora><titulo>Telediario 2</titulo></pase>
  <pase cadena="A3" fecha="2026-10-16"><hora>21:30</hora><titulo>El Hormiguero</titulo></pase>
</export>"#;

    fn config(dir: &Path, start_hour: u32, end_hour: u32) -> Config {
        let mut config = Config::default();
        config.schedule.start_hour = start_hour;
        config.schedule.end_hour = end_hour;
        config.playlist.path = dir.join("tv.m3u");
        config.artifacts.raw_path = dir.join("guia.xml");
        config.artifacts.intermediate_path = dir.join("guia.json");
        config.artifacts.normalized_path = dir.join("guia.xmltv.json");
        config.artifacts.output_path = dir.join("guia.xmltv.xml");
        config
    }

    fn scheduler(
        dir: &Path,
        window: (u32, u32),
        now: DateTime<Utc>,
        seed: u64,
        fetcher: CannedFetcher,
    ) -> CycleScheduler {
        CycleScheduler::new(&config(dir, window.0, window.1), Arc::new(fetcher))
            .unwrap()
            .with_clock(FixedClock(now))
            .with_rng(StdRng::seed_from_u64(seed))
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[rstest]
    #[case::early_morning(2, 6)]
    #[case::single_hour(4, 5)]
    #[case::evening(18, 23)]
    #[case::wraps_midnight(22, 3)]
    fn test_next_plan_lands_in_tomorrows_window(#[case] start_hour: u32, #[case] end_hour: u32) {
        let dir = TempDir::new().unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let (start, end) = ScheduleWindow::new(start_hour, end_hour)
            .bounds_on(tomorrow, chrono_tz::Europe::Madrid);

        for seed in 0..50 {
            let mut scheduler = scheduler(
                dir.path(),
                (start_hour, end_hour),
                noon(),
                seed,
                CannedFetcher(None),
            );
            let plan = scheduler.compute_next_plan();
            assert!(plan.next_run_at >= start.with_timezone(&Utc));
            assert!(plan.next_run_at < end.with_timezone(&Utc));
            assert_eq!(plan.remaining_ms, (plan.next_run_at - noon()).num_milliseconds());
        }
    }

    #[test]
    fn test_equal_hours_fire_exactly_at_start() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(dir.path(), (4, 4), noon(), 7, CannedFetcher(None));
        let plan = scheduler.compute_next_plan();
        let local = plan.next_run_at.with_timezone(&chrono_tz::Europe::Madrid);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        assert_eq!((local.hour(), local.minute(), local.second()), (4, 0, 0));
    }

    #[test]
    fn test_window_in_dst_gap_resolves_forward() {
        let dir = TempDir::new().unwrap();
        // 2026-03-29 02:00-03:00 does not exist in Madrid
        let now = Utc.with_ymd_and_hms(2026, 3, 28, 12, 0, 0).unwrap();
        let mut scheduler = scheduler(dir.path(), (2, 3), now, 3, CannedFetcher(None));
        let plan = scheduler.compute_next_plan();
        let local = plan.next_run_at.with_timezone(&chrono_tz::Europe::Madrid);
        assert_eq!(local.hour(), 3);
        assert_eq!(local.minute(), 0);
        assert!(plan.remaining_ms > 0);
    }

    proptest! {
        #[test]
        fn prop_next_plan_is_in_window_and_in_future(
            seed in any::<u64>(),
            start_hour in 0u32..24,
            end_hour in 0u32..24,
            minutes_into_day in 0i64..1440,
        ) {
            let dir = TempDir::new().unwrap();
            let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes_into_day);
            let mut scheduler = scheduler(dir.path(), (start_hour, end_hour), now, seed, CannedFetcher(None));

            let plan = scheduler.compute_next_plan();
            let tz = chrono_tz::Europe::Madrid;
            let tomorrow = now.with_timezone(&tz).date_naive().succ_opt().unwrap();
            let (start, end) = ScheduleWindow::new(start_hour, end_hour).bounds_on(tomorrow, tz);

            prop_assert!(plan.remaining_ms >= 0);
            prop_assert!(plan.next_run_at >= start.with_timezone(&Utc));
            if start == end {
                prop_assert_eq!(plan.next_run_at, start.with_timezone(&Utc));
            } else {
                prop_assert!(plan.next_run_at < end.with_timezone(&Utc));
            }
        }
    }

    #[tokio::test]
    async fn test_begin_cycle_rejected_while_busy() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(dir.path(), (2, 6), noon(), 1, CannedFetcher(None));

        let range = scheduler.begin_cycle().unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(range.days(), 7);
        assert_eq!(scheduler.state(), CycleState::Fetching);

        let err = scheduler.begin_cycle().unwrap_err();
        assert!(matches!(err, AppError::OperationInProgress { .. }));
        assert_eq!(scheduler.state(), CycleState::Fetching);
    }

    #[tokio::test]
    async fn test_arm_trigger_rejected_while_busy() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(dir.path(), (2, 6), noon(), 1, CannedFetcher(None));
        scheduler.state = CycleState::Converting;

        let plan = RunPlan::new(noon() + Duration::hours(1), noon());
        assert!(scheduler.arm_trigger(plan).is_err());
        assert!(!scheduler.is_armed());
    }

    #[tokio::test]
    async fn test_cycle_converts_fetched_export() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(dir.path(), (2, 6), noon(), 1, CannedFetcher(Some(EXPORT)));

        let state = scheduler.run_cycle().await.unwrap();
        assert_eq!(state, CycleState::Settled(CycleOutcome::Ok));
        assert_eq!(
            scheduler.metrics(),
            Metrics {
                channel_count: 2,
                programme_count: 2
            }
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("guia.xml")).unwrap(), EXPORT);
        assert!(dir.path().join("guia.xmltv.xml").exists());
        assert!(dir.path().join("tv.m3u").exists());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fetch_failure_is_logged_and_settles_failed() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(dir.path(), (2, 6), noon(), 1, CannedFetcher(None));

        let state = scheduler.run_cycle().await.unwrap();
        assert_eq!(state, CycleState::Settled(CycleOutcome::Failed));
        assert!(logs_contain("EPG fetch failed"));
        assert!(!dir.path().join("guia.xml").exists());
    }

    #[tokio::test]
    async fn test_conversion_failure_settles_failed() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(
            dir.path(),
            (2, 6),
            noon(),
            1,
            CannedFetcher(Some("<export><pase></export>")),
        );

        let state = scheduler.run_cycle().await.unwrap();
        assert_eq!(state, CycleState::Settled(CycleOutcome::Failed));
        assert_eq!(scheduler.metrics(), Metrics::default());

        let plan = scheduler.compute_next_plan();
        assert!(plan.remaining_ms > 0);
        scheduler.arm_trigger(plan).unwrap();
        assert!(scheduler.is_armed());
        // A new cycle may start once settled
        assert!(scheduler.begin_cycle().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_previous_trigger() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(dir.path(), (2, 6), noon(), 1, CannedFetcher(None));

        scheduler
            .arm_trigger(RunPlan::new(noon() + Duration::hours(10), noon()))
            .unwrap();
        scheduler
            .arm_trigger(RunPlan::new(noon() + Duration::minutes(5), noon()))
            .unwrap();

        let started = tokio::time::Instant::now();
        scheduler.wait_for_trigger().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= std::time::Duration::from_secs(300));
        assert!(elapsed < std::time::Duration::from_secs(301));
        assert!(!scheduler.is_armed());
        assert!(scheduler.wait_for_trigger().await.is_err());
    }
}
