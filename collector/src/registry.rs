use crate::{
    metrics::ExitCodeGauge,
    scraper::Scraper,
    task::{
        ExitCode,
        Task,
    },
};
use prometheus::{
    core::Desc,
    proto::MetricFamily,
};
use std::sync::Arc;

/// Read side of all tasks, registered once into a `prometheus::Registry`.
///
/// Serving a scrape only copies cached gauge values, no command ever runs on
/// this path.
#[derive(Default)]
pub struct Collector {
    tasks: Vec<Arc<dyn Task>>,
    exit_codes: Vec<ExitCodeGauge>,
}

impl Collector {
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Registers `task` with both the read side and the scraper.
///
/// Every query the task can issue starts out with a zero exit code, so the
/// series exist before the first update finishes.
pub fn add_task(collector: &mut Collector, scraper: &mut Scraper, task: Arc<dyn Task>, exit_code: ExitCodeGauge) {
    for query in task.queries() {
        exit_code.set(&query, ExitCode::Success);
    }
    if !collector
        .exit_codes
        .iter()
        .any(|known| known.name() == exit_code.name())
    {
        collector.exit_codes.push(exit_code.clone());
    }
    debug!(task = task.name(), exit_code = exit_code.name(), "task added");
    collector.tasks.push(task.clone());
    scraper.add(task, exit_code);
}

impl prometheus::core::Collector for Collector {
    fn desc(&self) -> Vec<&Desc> {
        self.tasks
            .iter()
            .flat_map(|task| task.describe())
            .chain(self.exit_codes.iter().flat_map(ExitCodeGauge::desc))
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.tasks
            .iter()
            .flat_map(|task| task.collect())
            .chain(self.exit_codes.iter().flat_map(ExitCodeGauge::collect))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::ScriptedTask;
    use prometheus::{
        Encoder,
        Registry,
        TextEncoder,
    };
    use std::sync::atomic::Ordering;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn exit_codes_start_at_zero_and_are_shared() {
        let exit_code = ExitCodeGauge::recon().unwrap();
        let first = Arc::new(ScriptedTask::new(std::iter::empty()));
        let second = Arc::new(ScriptedTask::new(std::iter::empty()));

        let mut collector = Collector::default();
        let mut scraper = Scraper::new(1);
        add_task(&mut collector, &mut scraper, first.clone(), exit_code.clone());
        add_task(&mut collector, &mut scraper, second, exit_code.clone());

        assert_eq!(collector.task_names(), vec!["scripted", "scripted"]);
        assert_eq!(scraper.task_names().len(), 2);
        assert_eq!(exit_code.get(&ScriptedTask::query()), Some(0.0));

        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();
        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "swift_recon_task_exit_code");
        assert_eq!(families[0].get_metric().len(), 1);
        assert_eq!(first.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn snapshot_follows_the_scraper() {
        let exit_code = ExitCodeGauge::dispersion().unwrap();
        let mut collector = Collector::default();
        let mut scraper = Scraper::new(1);
        add_task(
            &mut collector,
            &mut scraper,
            Arc::new(ScriptedTask::new([false])),
            exit_code,
        );

        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();
        scraper.update_all(&CancellationToken::new()).await;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains(r#"swift_dispersion_task_exit_code{query="--scripted --verbose"} 1"#));
    }
}
