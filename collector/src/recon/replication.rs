use super::{
    flexible::FlexibleF64,
    ReconOpts,
    ServerType,
};
use crate::{
    clock::Clock,
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
    sync::Arc,
};
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;

#[derive(Deserialize, Debug)]
struct Replication {
    #[serde(default)]
    replication_last: FlexibleF64,
    #[serde(default)]
    replication_time: FlexibleF64,
}

struct ReplicationGauges {
    server: ServerType,
    args: Vec<String>,
    age: GaugeVec,
    duration: GaugeVec,
}

pub struct ReplicationTask {
    opts: ReconOpts,
    clock: Arc<dyn Clock>,
    metrics: MetricSet,
    servers: Vec<ReplicationGauges>,
}

impl ReplicationTask {
    pub fn new(opts: ReconOpts, clock: Arc<dyn Clock>) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        let mut servers = Vec::new();
        for server in ServerType::iter() {
            let (plural, title) = match server {
                ServerType::Account => ("accounts", "Account"),
                ServerType::Container => ("containers", "Container"),
                ServerType::Object => ("objects", "Object"),
            };
            servers.push(ReplicationGauges {
                server,
                args: opts.args(Some(server), "--replication"),
                age: metrics.gauge_vec(
                    &format!("swift_cluster_{plural}_replication_age"),
                    &format!("{title} replication age reported by the swift-recon tool."),
                    &["storage_ip"],
                )?,
                duration: metrics.gauge_vec(
                    &format!("swift_cluster_{plural}_replication_duration"),
                    &format!("{title} replication duration reported by the swift-recon tool."),
                    &["storage_ip"],
                )?,
            });
        }
        Ok(Self {
            opts,
            clock,
            metrics,
            servers,
        })
    }
}

impl Task for ReplicationTask {
    fn name(&self) -> &'static str {
        "recon-replication"
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    fn queries(&self) -> Vec<Query> {
        self.servers.iter().map(|gauges| Query::from_args(&gauges.args)).collect()
    }

    fn update<'a>(&'a self, cancel: &'a CancellationToken) -> Pin<Box<dyn Future<Output = Vec<QueryOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(self.servers.len());
            for gauges in &self.servers {
                let now = self.clock.unix_seconds();
                let outcome = self
                    .opts
                    .query_per_host(&gauges.args, cancel, |host, data: Replication| {
                        let FlexibleF64(last) = data.replication_last;
                        // Never completed, there is no age to report.
                        if last > 0.0 {
                            gauges.age.with_label_values(&[host]).set(now - last);
                        }
                        gauges.duration.with_label_values(&[host]).set(data.replication_time.0);
                    })
                    .await;
                if let Some(err) = &outcome.error {
                    debug!(server = %gauges.server, error = %err, "replication query failed");
                }
                outcomes.push(outcome);
            }
            outcomes
        })
    }
}
