use super::{
    flexible::FlexibleF64,
    ReconOpts,
    ServerType,
};
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

/// Each server type reports its sweep time under its own key.
#[derive(Deserialize, Debug)]
struct Sweep {
    #[serde(default)]
    container_updater_sweep: Option<FlexibleF64>,
    #[serde(default)]
    object_updater_sweep: Option<FlexibleF64>,
}

impl Sweep {
    fn time(&self, server: ServerType) -> Option<f64> {
        match server {
            ServerType::Container => self.container_updater_sweep,
            ServerType::Object => self.object_updater_sweep,
            ServerType::Account => None,
        }
        .map(|FlexibleF64(seconds)| seconds)
    }
}

struct SweepGauge {
    server: ServerType,
    args: Vec<String>,
    time: GaugeVec,
}

pub struct UpdaterSweepTask {
    opts: ReconOpts,
    metrics: MetricSet,
    servers: Vec<SweepGauge>,
}

impl UpdaterSweepTask {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        let mut servers = Vec::new();
        for (server, plural, title) in [
            (ServerType::Container, "containers", "Container"),
            (ServerType::Object, "objects", "Object"),
        ] {
            servers.push(SweepGauge {
                server,
                args: opts.args(Some(server), "--updater"),
                time: metrics.gauge_vec(
                    &format!("swift_cluster_{plural}_updater_sweep_time"),
                    &format!("{title} updater sweep time reported by the swift-recon tool."),
                    &["storage_ip"],
                )?,
            });
        }
        Ok(Self {
            opts,
            metrics,
            servers,
        })
    }
}

impl Task for UpdaterSweepTask {
    fn name(&self) -> &'static str {
        "recon-updater-sweep-time"
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    fn queries(&self) -> Vec<Query> {
        self.servers.iter().map(|sweep| Query::from_args(&sweep.args)).collect()
    }

    fn update<'a>(&'a self, cancel: &'a CancellationToken) -> Pin<Box<dyn Future<Output = Vec<QueryOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(self.servers.len());
            for sweep in &self.servers {
                let outcome = self
                    .opts
                    .query_per_host(&sweep.args, cancel, |host, data: Sweep| match data.time(sweep.server) {
                        Some(seconds) => sweep.time.with_label_values(&[host]).set(seconds),
                        None => debug!(host, server = %sweep.server, "no updater sweep time reported"),
                    })
                    .await;
                outcomes.push(outcome);
            }
            outcomes
        })
    }
}
