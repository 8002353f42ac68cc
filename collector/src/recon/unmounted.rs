use super::ReconOpts;
use crate::{
    metrics::MetricSet,
    task::{
        Query,
        QueryOutcome,
        Task,
    },
};
use prometheus::GaugeVec;
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
};
use tokio_util::sync::CancellationToken;

#[derive(Deserialize, Debug)]
struct UnmountedDrive {
    #[expect(unused)]
    #[serde(default)]
    device: String,
}

pub struct UnmountedTask {
    opts: ReconOpts,
    args: Vec<String>,
    metrics: MetricSet,
    unmounted_drives: GaugeVec,
}

impl UnmountedTask {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        Ok(Self {
            args: opts.args(None, "--unmounted"),
            opts,
            unmounted_drives: metrics.gauge_vec(
                "swift_cluster_drives_unmounted",
                "Unmounted drives reported by the swift-recon tool.",
                &["storage_ip"],
            )?,
            metrics,
        })
    }
}

impl Task for UnmountedTask {
    fn name(&self) -> &'static str {
        "recon-unmounted"
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::from_args(&self.args)]
    }

    fn update<'a>(&'a self, cancel: &'a CancellationToken) -> Pin<Box<dyn Future<Output = Vec<QueryOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let outcome = self
                .opts
                .query_per_host(&self.args, cancel, |host, drives: Vec<UnmountedDrive>| {
                    trace!(host, ?drives, "unmounted drives");
                    self.unmounted_drives.with_label_values(&[host]).set(drives.len() as f64);
                })
                .await;
            vec![outcome]
        })
    }
}
