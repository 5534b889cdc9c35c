use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::health::RefreshStatus;
use crate::api::latency::CycleTimings;
use crate::collector::{Collector, CollectorError, DatasetWritten, ProcessCollector};
use crate::config::{Config, DataPaths};
use crate::pipeline::refresh_tables;
use crate::publish::PublishReport;
use crate::types::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RefreshState {
    Idle = 0,
    Collecting = 1,
    Aggregating = 2,
    Sleeping = 3,
    Stopped = 4,
}

impl RefreshState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => RefreshState::Collecting,
            2 => RefreshState::Aggregating,
            3 => RefreshState::Sleeping,
            4 => RefreshState::Stopped,
            _ => RefreshState::Idle,
        }
    }
}

#[derive(Debug)]
pub struct CollectorOutcome {
    pub source: Source,
    pub result: Result<DatasetWritten, CollectorError>,
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub collectors: Vec<CollectorOutcome>,
    /// `None` when aggregation failed and the previous tables were left in place.
    pub published: Option<PublishReport>,
    pub collect_elapsed: Duration,
    pub aggregate_elapsed: Duration,
}

impl CycleReport {
    pub fn failed_collectors(&self) -> usize {
        self.collectors.iter().filter(|c| c.result.is_err()).count()
    }

    pub fn failed_sources(&self) -> Vec<Source> {
        self.collectors
            .iter()
            .filter(|c| c.result.is_err())
            .map(|c| c.source)
            .collect()
    }
}

/// Re-runs the collectors and rebuilds the recommendation tables on a fixed cadence.
///
/// Cycle: `Collecting` (each collector in turn, failures logged and skipped) →
/// `Aggregating` (score and publish over whatever datasets are on disk) →
/// `Sleeping`. With no interval the loop stops after the first cycle.
/// Cycles never overlap: the loop is one sequential control flow.
pub struct RefreshOrchestrator {
    paths: DataPaths,
    interval: Option<Duration>,
    collectors: Vec<Arc<dyn Collector>>,
    status: Arc<RefreshStatus>,
    timings: Arc<CycleTimings>,
}

impl RefreshOrchestrator {
    pub fn new(
        paths: DataPaths,
        interval: Option<Duration>,
        collectors: Vec<Arc<dyn Collector>>,
        status: Arc<RefreshStatus>,
        timings: Arc<CycleTimings>,
    ) -> Self {
        Self {
            paths,
            interval,
            collectors,
            status,
            timings,
        }
    }

    /// Process collectors for every configured source, in configured order.
    pub fn from_config(cfg: &Config, status: Arc<RefreshStatus>, timings: Arc<CycleTimings>) -> Self {
        let paths = cfg.data_paths();
        let collectors = cfg
            .collectors
            .iter()
            .map(|(source, command)| {
                Arc::new(ProcessCollector::new(
                    *source,
                    command.clone(),
                    paths.dataset(*source),
                    cfg.collector_timeout,
                )) as Arc<dyn Collector>
            })
            .collect();
        Self::new(paths, cfg.refresh_interval, collectors, status, timings)
    }

    /// Runs until `shutdown` flips to true (or its sender is dropped), or after
    /// one cycle when no interval is set. Shutdown is only observed between cycles.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut cycle = 0u64;

        loop {
            if *shutdown.borrow() {
                info!("Refresh loop: shutdown requested");
                break;
            }

            cycle += 1;
            let report = self.run_cycle(cycle).await;
            info!(
                cycle = report.cycle,
                failed_collectors = report.failed_collectors(),
                failed_sources = ?report.failed_sources(),
                published = report.published.is_some(),
                collect_ms = report.collect_elapsed.as_millis() as u64,
                aggregate_ms = report.aggregate_elapsed.as_millis() as u64,
                "Refresh cycle {cycle} complete",
            );

            let Some(interval) = self.interval else {
                info!("Refresh interval <= 0, exiting after single run");
                break;
            };

            self.status.set_state(RefreshState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("Refresh loop: shutdown requested while sleeping");
                    break;
                }
            }
        }

        self.status.set_state(RefreshState::Stopped);
    }

    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        info!(cycle, "Auto-refresh run {cycle} starting");
        self.status.begin_cycle(now_ns());

        // --- Collecting ---
        self.status.set_state(RefreshState::Collecting);
        let collect_started = Instant::now();
        let mut collectors = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            let source = collector.source();
            info!(source = %source, "Running {source} collector");

            // Own task so a panicking collector is contained like any other failure.
            let task = Arc::clone(collector);
            let result = match tokio::spawn(async move { task.run().await }).await {
                Ok(r) => r,
                Err(e) => Err(CollectorError::Failed(format!("collector task aborted: {e}"))),
            };

            match &result {
                Ok(written) => info!(
                    source = %written.source,
                    elapsed_ms = written.elapsed.as_millis() as u64,
                    "{source} collector wrote {} in {:.1}s",
                    written.path.display(),
                    written.elapsed.as_secs_f64(),
                ),
                Err(e) => {
                    warn!(source = %source, "{source} collector failed, keeping existing dataset: {e}");
                    self.status.record_collector_failure();
                }
            }
            collectors.push(CollectorOutcome { source, result });
        }
        let collect_elapsed = collect_started.elapsed();
        self.timings.record_collect(collect_elapsed);

        // --- Aggregating ---
        self.status.set_state(RefreshState::Aggregating);
        let aggregate_started = Instant::now();
        let paths = self.paths.clone();
        let published = match tokio::task::spawn_blocking(move || refresh_tables(&paths)).await {
            Ok(Ok(report)) => {
                info!(
                    buy_rows = report.buy_rows,
                    sell_rows = report.sell_rows,
                    "Re-generated recommendations successfully"
                );
                self.status.record_publish(now_ns());
                Some(report)
            }
            Ok(Err(e)) => {
                error!("Error generating recommendations: {e}");
                self.status.record_error(format!("cycle {cycle}: {e}"));
                None
            }
            Err(e) => {
                error!("Recommendation task aborted: {e}");
                self.status.record_error(format!("cycle {cycle}: {e}"));
                None
            }
        };
        let aggregate_elapsed = aggregate_started.elapsed();
        self.timings.record_aggregate(aggregate_elapsed);
        self.status.finish_cycle();

        CycleReport {
            cycle,
            collectors,
            published,
            collect_elapsed,
            aggregate_elapsed,
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshHandle
// ---------------------------------------------------------------------------

struct ActiveLoop {
    shutdown_tx: watch::Sender<bool>,
    finished_rx: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ActiveLoop {
    fn is_running(&self) -> bool {
        !*self.finished_rx.borrow() && !self.task.is_finished()
    }
}

/// Lifecycle owner for the background refresh loop. At most one loop is active per handle.
#[derive(Default)]
pub struct RefreshHandle {
    active: Mutex<Option<ActiveLoop>>,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the loop. Returns false, leaving the running loop untouched, if one is already active.
    pub fn start(&self, orchestrator: RefreshOrchestrator) -> bool {
        let status = Arc::clone(&orchestrator.status);
        self.spawn_loop(status, |shutdown| orchestrator.run(shutdown))
    }

    fn spawn_loop<F, Fut>(&self, status: Arc<RefreshStatus>, run: F) -> bool
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(ActiveLoop::is_running) {
            warn!("Refresh loop already running; start ignored");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(run(shutdown_rx), status, finished_tx));
        *active = Some(ActiveLoop {
            shutdown_tx,
            finished_rx,
            task,
        });
        info!("Refresh loop started");
        true
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(ActiveLoop::is_running)
    }

    /// Ask the loop to stop after its current cycle and wait for it to exit.
    /// Returns whether a loop was active.
    pub async fn stop(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(active) = active else {
            return false;
        };

        let was_running = active.is_running();
        let _ = active.shutdown_tx.send(true);
        if let Err(e) = active.task.await {
            error!("Refresh supervisor failed: {e}");
        }
        was_running
    }

    /// Wait until the loop exits on its own (single-run mode) or is stopped.
    pub async fn wait(&self) {
        let finished = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|l| l.finished_rx.clone());
        let Some(mut finished) = finished else {
            return;
        };
        while !*finished.borrow_and_update() {
            if finished.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Outer boundary of the background loop: whatever ends it gets logged.
async fn supervise<Fut>(run: Fut, status: Arc<RefreshStatus>, finished: watch::Sender<bool>)
where
    Fut: Future<Output = ()> + Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(()) => info!("Refresh loop stopped"),
        Err(e) => {
            error!("Refresh loop terminated abnormally: {e}");
            status.record_error(format!("refresh loop terminated: {e}"));
            status.set_state(RefreshState::Stopped);
        }
    }
    let _ = finished.send(true);
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::read_table;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Write(&'static str),
        Fail,
        Panic,
    }

    struct FakeCollector {
        source: Source,
        dataset: PathBuf,
        behavior: Behavior,
        delay: Duration,
        log: Arc<Mutex<Vec<String>>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Collector for FakeCollector {
        fn source(&self) -> Source {
            self.source
        }

        async fn run(&self) -> Result<DatasetWritten, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(format!("start {}", self.source));
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(format!("end {}", self.source));
            match self.behavior {
                Behavior::Write(body) => {
                    std::fs::write(&self.dataset, body).unwrap();
                    Ok(DatasetWritten {
                        source: self.source,
                        path: self.dataset.clone(),
                        elapsed: self.delay,
                    })
                }
                Behavior::Fail => Err(CollectorError::ExitStatus { code: Some(1) }),
                Behavior::Panic => panic!("scraper blew up"),
            }
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        paths: DataPaths,
        status: Arc<RefreshStatus>,
        timings: Arc<CycleTimings>,
        log: Arc<Mutex<Vec<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = DataPaths::new(dir.path());
            Self {
                _dir: dir,
                paths,
                status: Arc::new(RefreshStatus::new()),
                timings: Arc::new(CycleTimings::new()),
                log: Arc::new(Mutex::new(Vec::new())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn collector(&self, source: Source, behavior: Behavior) -> Arc<dyn Collector> {
            Arc::new(FakeCollector {
                source,
                dataset: self.paths.dataset(source),
                behavior,
                delay: Duration::from_millis(10),
                log: Arc::clone(&self.log),
                calls: Arc::clone(&self.calls),
            })
        }

        fn orchestrator(
            &self,
            interval: Option<Duration>,
            collectors: Vec<Arc<dyn Collector>>,
        ) -> RefreshOrchestrator {
            RefreshOrchestrator::new(
                self.paths.clone(),
                interval,
                collectors,
                Arc::clone(&self.status),
                Arc::clone(&self.timings),
            )
        }

        fn healthy(&self) -> Vec<Arc<dyn Collector>> {
            vec![
                self.collector(
                    Source::Insider,
                    Behavior::Write("ticker,transaction_type\nTSLA,Purchase\n"),
                ),
                self.collector(
                    Source::Congress,
                    Behavior::Write("ticker,transaction_type\nAAPL,Purchase\nAAPL,Purchase\n"),
                ),
                self.collector(
                    Source::HedgeFund,
                    Behavior::Write("ticker,action\nNVDA,Purchase\n"),
                ),
            ]
        }

        fn buy_tickers(&self) -> Vec<String> {
            read_table(&self.paths.buy_table())
                .unwrap()
                .into_iter()
                .map(|r| r.ticker)
                .collect()
        }
    }

    #[tokio::test]
    async fn collectors_run_one_after_another() {
        let h = Harness::new();
        let report = h.orchestrator(None, h.healthy()).run_cycle(1).await;

        assert_eq!(report.failed_collectors(), 0);
        assert!(report.published.is_some());
        let log = h.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "start insider",
                "end insider",
                "start congress",
                "end congress",
                "start hedge_fund",
                "end hedge_fund",
            ]
        );
    }

    #[tokio::test]
    async fn one_failing_collector_keeps_its_previous_data() {
        let h = Harness::new();
        // Dataset left over from an earlier cycle.
        std::fs::write(
            h.paths.dataset(Source::Insider),
            "ticker,transaction_type\nMSFT,Purchase\n",
        )
        .unwrap();

        let collectors = vec![
            h.collector(Source::Insider, Behavior::Fail),
            h.collector(
                Source::Congress,
                Behavior::Write("ticker,transaction_type\nAAPL,Purchase\nAAPL,Purchase\n"),
            ),
            h.collector(
                Source::HedgeFund,
                Behavior::Write("ticker,action\nNVDA,Purchase\n"),
            ),
        ];
        let report = h.orchestrator(None, collectors).run_cycle(1).await;

        assert_eq!(report.failed_collectors(), 1);
        assert!(report.published.is_some());
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.status.collector_failures(), 1);

        let tickers = h.buy_tickers();
        assert!(tickers.contains(&"AAPL".to_string()));
        assert!(tickers.contains(&"NVDA".to_string()));
        assert!(tickers.contains(&"MSFT".to_string()));
    }

    #[tokio::test]
    async fn panicking_collector_is_isolated() {
        let h = Harness::new();
        let collectors = vec![
            h.collector(Source::Insider, Behavior::Panic),
            h.collector(
                Source::Congress,
                Behavior::Write("ticker,transaction_type\nAAPL,Purchase\nAAPL,Purchase\n"),
            ),
        ];
        let report = h.orchestrator(None, collectors).run_cycle(1).await;

        assert_eq!(report.failed_collectors(), 1);
        assert!(matches!(
            report.collectors[0].result,
            Err(CollectorError::Failed(_))
        ));
        assert_eq!(h.buy_tickers(), vec!["AAPL".to_string()]);
    }

    #[tokio::test]
    async fn publish_failure_leaves_previous_tables() {
        let h = Harness::new();
        let old_sell = "ticker,score,confidence\nOLD,1.0,Low\n";
        std::fs::write(h.paths.sell_table(), old_sell).unwrap();
        // A directory where the buy table should go makes the swap fail.
        std::fs::create_dir(h.paths.buy_table()).unwrap();

        let report = h.orchestrator(None, h.healthy()).run_cycle(7).await;

        assert!(report.published.is_none());
        assert_eq!(std::fs::read_to_string(h.paths.sell_table()).unwrap(), old_sell);
        let err = h.status.last_error().unwrap();
        assert!(err.starts_with("cycle 7"), "{err}");
        assert_eq!(h.status.cycles_completed(), 1);
    }

    #[tokio::test]
    async fn no_interval_runs_a_single_cycle() {
        let h = Harness::new();
        let (_tx, rx) = watch::channel(false);
        h.orchestrator(None, h.healthy()).run(rx).await;

        assert_eq!(h.status.cycles_completed(), 1);
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.status.state(), RefreshState::Stopped);
        assert!(h.status.snapshot().last_published_ns.is_some());
        assert_eq!(h.timings.len(), 1);
    }

    #[tokio::test]
    async fn handle_rejects_second_start_and_stops_while_sleeping() {
        let h = Harness::new();
        let handle = RefreshHandle::new();
        let hour = Some(Duration::from_secs(3600));

        assert!(handle.start(h.orchestrator(hour, h.healthy())));
        assert!(!handle.start(h.orchestrator(hour, h.healthy())));
        assert!(handle.is_running());

        // Let the first cycle finish and the loop go to sleep.
        for _ in 0..200 {
            if h.status.state() == RefreshState::Sleeping {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.status.state(), RefreshState::Sleeping);

        assert!(handle.stop().await);
        assert!(!handle.is_running());
        assert!(!handle.stop().await);
        assert_eq!(h.status.state(), RefreshState::Stopped);
        // Only the first handle's collectors ever ran, and only once.
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stop_mid_cycle_lets_the_cycle_finish() {
        let h = Harness::new();
        let handle = RefreshHandle::new();
        handle.start(h.orchestrator(Some(Duration::from_secs(3600)), h.healthy()));

        for _ in 0..200 {
            if h.status.state() == RefreshState::Collecting {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(handle.stop().await);

        assert_eq!(h.status.cycles_completed(), 1);
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
        assert!(h.paths.buy_table().exists());
    }

    #[tokio::test]
    async fn loop_panic_is_recorded_and_ends_the_loop() {
        let h = Harness::new();
        let handle = RefreshHandle::new();
        h.status.set_state(RefreshState::Collecting);

        assert!(handle.spawn_loop(Arc::clone(&h.status), |_shutdown| async {
            panic!("refresh loop blew up")
        }));
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();

        assert_eq!(h.status.state(), RefreshState::Stopped);
        let err = h.status.last_error().unwrap();
        assert!(err.starts_with("refresh loop terminated"), "{err}");
        assert!(!handle.is_running());
        // The handle stays usable after a crashed loop.
        assert!(handle.start(h.orchestrator(None, h.healthy())));
        handle.wait().await;
        assert_eq!(h.status.cycles_completed(), 1);
    }

    #[tokio::test]
    async fn failed_sell_publish_keeps_previous_buy_table() {
        let h = Harness::new();
        let old_buy = "ticker,score,confidence\nOLD,1.0,Low\n";
        std::fs::write(h.paths.buy_table(), old_buy).unwrap();
        std::fs::create_dir(h.paths.sell_table()).unwrap();

        let report = h.orchestrator(None, h.healthy()).run_cycle(1).await;

        assert!(report.published.is_none());
        assert_eq!(std::fs::read_to_string(h.paths.buy_table()).unwrap(), old_buy);
        assert!(h.status.snapshot().last_published_ns.is_none());
        assert!(h.status.last_error().is_some());
    }

    #[tokio::test]
    async fn wait_returns_after_single_run() {
        let h = Harness::new();
        let handle = RefreshHandle::new();
        assert!(handle.start(h.orchestrator(None, h.healthy())));
        handle.wait().await;

        assert!(!handle.is_running());
        assert_eq!(h.status.cycles_completed(), 1);
        // Finished loops can be started again.
        assert!(handle.start(h.orchestrator(None, h.healthy())));
        handle.wait().await;
        assert_eq!(h.status.cycles_completed(), 2);
    }
}
