use crate::task::{
    ExitCode,
    Query,
};
use prometheus::{
    core::{
        Collector,
        Desc,
    },
    proto::MetricFamily,
    Gauge,
    GaugeVec,
    Opts,
};

/// The gauges of one task, in declaration order.
///
/// The handles returned by [`MetricSet::gauge`] and [`MetricSet::gauge_vec`]
/// share their values with the set, so a task updates the handles and the
/// set reads them back when collected.
#[derive(Default)]
pub struct MetricSet {
    collectors: Vec<Box<dyn Collector>>,
}

impl MetricSet {
    pub fn gauge(&mut self, name: &str, help: &str) -> prometheus::Result<Gauge> {
        let gauge = Gauge::with_opts(Opts::new(name, help))?;
        self.collectors.push(Box::new(gauge.clone()));
        Ok(gauge)
    }

    pub fn gauge_vec(&mut self, name: &str, help: &str, labels: &[&str]) -> prometheus::Result<GaugeVec> {
        let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
        self.collectors.push(Box::new(gauge.clone()));
        Ok(gauge)
    }

    pub fn desc(&self) -> Vec<&Desc> {
        self.collectors.iter().flat_map(|collector| collector.desc()).collect()
    }

    pub fn collect(&self) -> Vec<MetricFamily> {
        self.collectors.iter().flat_map(|collector| collector.collect()).collect()
    }
}

/// `<tool>_task_exit_code{query}`, shared by all tasks driving the same executable.
#[derive(Clone)]
pub struct ExitCodeGauge {
    name: &'static str,
    gauge: GaugeVec,
}

impl ExitCodeGauge {
    pub fn recon() -> prometheus::Result<Self> {
        Self::new(
            "swift_recon_task_exit_code",
            "The exit code for a Swift Recon query execution.",
        )
    }

    pub fn dispersion() -> prometheus::Result<Self> {
        Self::new(
            "swift_dispersion_task_exit_code",
            "The exit code for a Swift dispersion report query execution.",
        )
    }

    fn new(name: &'static str, help: &str) -> prometheus::Result<Self> {
        Ok(Self {
            name,
            gauge: GaugeVec::new(Opts::new(name, help), &["query"])?,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn set(&self, query: &Query, exit_code: ExitCode) {
        self.gauge.with_label_values(&[query.as_str()]).set(exit_code.as_f64());
    }

    pub fn get(&self, query: &Query) -> Option<f64> {
        value(&self.gauge, &[query.as_str()])
    }

    pub(crate) fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    pub(crate) fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.collect()
    }
}

/// Reads a labelled value back, `None` when the series was never written.
///
/// `labels` are given in declaration order.
pub fn value(gauge: &GaugeVec, labels: &[&str]) -> Option<f64> {
    // `get_metric_with_label_values` creates missing series, so look at the snapshot instead.
    let names = gauge.desc().first()?.variable_labels.clone();
    gauge.collect().first().and_then(|family| {
        family
            .get_metric()
            .iter()
            .find(|metric| {
                let pairs = metric.get_label();
                pairs.len() == labels.len()
                    && names.iter().zip(labels).all(|(name, value)| {
                        pairs
                            .iter()
                            .any(|pair| pair.get_name() == name && pair.get_value() == *value)
                    })
            })
            .map(|metric| metric.get_gauge().get_value())
    })
}
