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
struct DriveAudit {
    #[serde(default)]
    drive_audit_errors: i64,
}

pub struct DriveAuditTask {
    opts: ReconOpts,
    args: Vec<String>,
    metrics: MetricSet,
    audit_errors: GaugeVec,
}

impl DriveAuditTask {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        Ok(Self {
            args: opts.args(None, "--driveaudit"),
            opts,
            audit_errors: metrics.gauge_vec(
                "swift_cluster_drives_audit_errors",
                "Drive audit errors reported by the swift-recon tool.",
                &["storage_ip"],
            )?,
            metrics,
        })
    }
}

impl Task for DriveAuditTask {
    fn name(&self) -> &'static str {
        "recon-driveaudit"
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
                .query_per_host(&self.args, cancel, |host, data: DriveAudit| {
                    self.audit_errors
                        .with_label_values(&[host])
                        .set(data.drive_audit_errors as f64);
                })
                .await;
            vec![outcome]
        })
    }
}
