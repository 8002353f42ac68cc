use crate::{
    metrics::ExitCodeGauge,
    task::{
        ExitCode,
        Query,
        QueryOutcome,
        Task,
    },
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Drives every task's update on a fixed period.
///
/// A failing query only shows up on its exit code gauge after `max_failures`
/// consecutive failed cycles, a single success clears it again.
pub struct Scraper {
    max_failures: u32,
    interval: Duration,
    tasks: Vec<(Arc<dyn Task>, ExitCodeGauge)>,
    failure_counts: HashMap<Query, u32>,
}

impl Scraper {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            interval: DEFAULT_INTERVAL,
            tasks: Vec::new(),
            failure_counts: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub(crate) fn add(&mut self, task: Arc<dyn Task>, exit_code: ExitCodeGauge) {
        self.tasks.push((task, exit_code));
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(task, _)| task.name()).collect()
    }

    /// Consecutive failed cycles of `query`.
    pub fn failures(&self, query: &Query) -> u32 {
        self.failure_counts.get(query).copied().unwrap_or_default()
    }

    /// One pass over all tasks, one after another.
    pub async fn update_all(&mut self, cancel: &CancellationToken) {
        for (task, exit_code) in &self.tasks {
            if cancel.is_cancelled() {
                return;
            }
            let started = Instant::now();
            let outcomes = task.update(cancel).await;
            debug!(task = task.name(), elapsed = ?started.elapsed(), queries = outcomes.len(), "task updated");

            // Outcomes of an interrupted update say nothing about the cluster.
            if cancel.is_cancelled() {
                return;
            }
            for outcome in outcomes {
                record(&mut self.failure_counts, self.max_failures, task.name(), exit_code, outcome);
            }
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(tasks = ?self.task_names(), interval = ?self.interval, "scraper started");
        loop {
            let started = Instant::now();
            self.update_all(&cancel).await;
            let pause = self.interval.saturating_sub(started.elapsed());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {},
            }
        }
        info!("scraper stopped");
    }
}

fn record(
    failure_counts: &mut HashMap<Query, u32>,
    max_failures: u32,
    task: &str,
    exit_code: &ExitCodeGauge,
    outcome: QueryOutcome,
) {
    let QueryOutcome { query, error } = outcome;
    let count = failure_counts.entry(query.clone()).or_default();

    let Some(err) = error else {
        *count = 0;
        exit_code.set(&query, ExitCode::Success);
        return;
    };

    *count = count.saturating_add(1);
    if *count >= max_failures {
        error!(task, failures = *count, "{err}");
        exit_code.set(&query, ExitCode::Failure);
    } else {
        info!(task, failures = *count, "{err}");
        exit_code.set(&query, ExitCode::Success);
    }
}


#[cfg(test)]
mod tests {
    use super::{
        testing::ScriptedTask,
        *,
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    async fn cycles(max_failures: u32, results: &[bool]) -> Vec<(u32, f64)> {
        let task = Arc::new(ScriptedTask::new(results.iter().copied()));
        let exit_code = ExitCodeGauge::recon().unwrap();
        let mut scraper = Scraper::new(max_failures);
        scraper.add(task, exit_code.clone());

        let cancel = CancellationToken::new();
        let query = ScriptedTask::query();
        let mut seen = Vec::new();
        for _ in results {
            scraper.update_all(&cancel).await;
            seen.push((scraper.failures(&query), exit_code.get(&query).unwrap()));
        }
        seen
    }

    #[tokio::test]
    async fn failure_becomes_visible_on_the_kth_cycle() {
        assert_eq!(
            cycles(3, &[false, false, false, false, true]).await,
            vec![(1, 0.0), (2, 0.0), (3, 1.0), (4, 1.0), (0, 0.0)]
        );
    }

    #[tokio::test]
    async fn success_resets_the_streak() {
        assert_eq!(
            cycles(2, &[false, true, false, false]).await,
            vec![(1, 0.0), (0, 0.0), (1, 0.0), (2, 1.0)]
        );
    }

    #[tokio::test]
    async fn zero_threshold_behaves_like_one() {
        assert_eq!(cycles(0, &[false, true]).await, vec![(1, 1.0), (0, 0.0)]);
        assert_eq!(cycles(1, &[false, true]).await, vec![(1, 1.0), (0, 0.0)]);
    }

    #[tokio::test]
    async fn cancelled_pass_updates_nothing() {
        let task = Arc::new(ScriptedTask::new([false]));
        let mut scraper = Scraper::new(1);
        scraper.add(task.clone(), ExitCodeGauge::recon().unwrap());

        let cancel = CancellationToken::new();
        cancel.cancel();
        scraper.update_all(&cancel).await;

        assert_eq!(task.updates.load(Ordering::SeqCst), 0);
        assert_eq!(scraper.failures(&ScriptedTask::query()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_repeats_until_cancelled() {
        let task = Arc::new(ScriptedTask::new(std::iter::empty()));
        let mut scraper = Scraper::new(1).with_interval(Duration::from_secs(60));
        scraper.add(task.clone(), ExitCodeGauge::recon().unwrap());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scraper.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(task.updates.load(Ordering::SeqCst), 3);
    }
}
