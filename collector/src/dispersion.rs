//! The task built on `swift-dispersion-report --dump-json`.

use crate::{
    command,
    error::{
        TaskError,
        TaskErrorKind,
    },
    metrics::MetricSet,
    task::{
        Query,
        QueryOutcome,
        Task,
    },
    transcript::{
        self,
        strip_dispersion_errors,
    },
};
use prometheus::Gauge;
use serde::Deserialize;
use std::{
    future::Future,
    path::PathBuf,
    pin::Pin,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

pub const SWIFT_DISPERSION_REPORT: &str = "swift-dispersion-report";

#[derive(Debug, Clone)]
pub struct DispersionOpts {
    pub executable: PathBuf,
    pub timeout: Duration,
}

#[derive(Deserialize, Debug, Default)]
struct Report {
    #[serde(default)]
    object: Copies,
    #[serde(default)]
    container: Copies,
}

#[derive(Deserialize, Debug, Default)]
struct Copies {
    #[serde(default)]
    copies_expected: i64,
    #[serde(default)]
    copies_found: i64,
    #[serde(default)]
    overlapping: i64,
}

impl Copies {
    /// Only meaningful once both sides were counted.
    fn missing(&self) -> i64 {
        if self.copies_expected > 0 && self.copies_found > 0 {
            self.copies_expected - self.copies_found
        } else {
            0
        }
    }
}

struct CopiesGauges {
    expected: Gauge,
    found: Gauge,
    missing: Gauge,
    overlapping: Gauge,
}

impl CopiesGauges {
    fn new(metrics: &mut MetricSet, kind: &str) -> prometheus::Result<Self> {
        let gauge = |metrics: &mut MetricSet, name: &str, help: &str| {
            metrics.gauge(
                &format!("swift_dispersion_{kind}_{name}"),
                &format!("{help} {kind} copies reported by the swift-dispersion-report tool."),
            )
        };
        Ok(Self {
            expected: gauge(metrics, "copies_expected", "Expected")?,
            found: gauge(metrics, "copies_found", "Found")?,
            missing: gauge(metrics, "copies_missing", "Missing")?,
            overlapping: gauge(metrics, "overlapping", "Overlapping")?,
        })
    }

    fn set(&self, copies: &Copies) {
        self.expected.set(copies.copies_expected as f64);
        self.found.set(copies.copies_found as f64);
        self.missing.set(copies.missing() as f64);
        self.overlapping.set(copies.overlapping as f64);
    }
}

pub struct DispersionTask {
    opts: DispersionOpts,
    args: Vec<String>,
    metrics: MetricSet,
    errors: Gauge,
    container: CopiesGauges,
    object: CopiesGauges,
}

impl DispersionTask {
    pub fn new(opts: DispersionOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        let errors = metrics.gauge(
            "swift_dispersion_errors",
            "The number of errors in the Swift dispersion report.",
        )?;
        let container = CopiesGauges::new(&mut metrics, "container")?;
        let object = CopiesGauges::new(&mut metrics, "object")?;
        Ok(Self {
            opts,
            args: vec!["--dump-json".to_string()],
            metrics,
            errors,
            container,
            object,
        })
    }

    async fn report(&self, cancel: &CancellationToken) -> Result<(), TaskError> {
        let output = command::run(&self.opts.executable, &self.args, self.opts.timeout, cancel)
            .await
            .map_err(|err| TaskError::new(SWIFT_DISPERSION_REPORT, &self.args, err))?;

        let (remainder, report_errors) = strip_dispersion_errors(&output);
        let mut failure = None;
        let mut count = 0u32;
        // Unmounted devices show up in the unmounted drives task instead.
        for report_error in report_errors.into_iter().filter(|report_error| !report_error.unmounted) {
            count += 1;
            let err = TaskError::new(
                SWIFT_DISPERSION_REPORT,
                &self.args,
                TaskErrorKind::Reported(report_error.message),
            )
            .with_host(report_error.host);
            info!(error = %err, "dispersion report error");
            failure = Some(err);
        }
        self.errors.set(f64::from(count));

        let report: Report = transcript::decode(&remainder).map_err(|err| {
            TaskError::new(SWIFT_DISPERSION_REPORT, &self.args, err)
                .with_output(String::from_utf8_lossy(remainder.trim_ascii()))
        })?;
        self.container.set(&report.container);
        self.object.set(&report.object);

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Task for DispersionTask {
    fn name(&self) -> &'static str {
        "dispersion-report"
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::from_args(&self.args)]
    }

    fn update<'a>(&'a self, cancel: &'a CancellationToken) -> Pin<Box<dyn Future<Output = Vec<QueryOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let query = Query::from_args(&self.args);
            let outcome = match self.report(cancel).await {
                Ok(()) => QueryOutcome::success(query),
                Err(err) => QueryOutcome::failure(query, err),
            };
            vec![outcome]
        })
    }
}
