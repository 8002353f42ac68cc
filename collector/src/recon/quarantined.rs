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

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
struct Quarantined {
    #[serde(default)]
    objects: i64,
    #[serde(default)]
    accounts: i64,
    #[serde(default)]
    containers: i64,
}

pub struct QuarantinedTask {
    opts: ReconOpts,
    args: Vec<String>,
    metrics: MetricSet,
    accounts: GaugeVec,
    containers: GaugeVec,
    objects: GaugeVec,
}

impl QuarantinedTask {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        Ok(Self {
            args: opts.args(None, "--quarantined"),
            opts,
            accounts: metrics.gauge_vec(
                "swift_cluster_accounts_quarantined",
                "Quarantined accounts reported by the swift-recon tool.",
                &["storage_ip"],
            )?,
            containers: metrics.gauge_vec(
                "swift_cluster_containers_quarantined",
                "Quarantined containers reported by the swift-recon tool.",
                &["storage_ip"],
            )?,
            objects: metrics.gauge_vec(
                "swift_cluster_objects_quarantined",
                "Quarantined objects reported by the swift-recon tool.",
                &["storage_ip"],
            )?,
            metrics,
        })
    }
}

impl Task for QuarantinedTask {
    fn name(&self) -> &'static str {
        "recon-quarantined"
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
                .query_per_host(&self.args, cancel, |host, data: Quarantined| {
                    self.accounts.with_label_values(&[host]).set(data.accounts as f64);
                    self.containers.with_label_values(&[host]).set(data.containers as f64);
                    self.objects.with_label_values(&[host]).set(data.objects as f64);
                })
                .await;
            vec![outcome]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::value,
        recon::testing::*,
    };
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn reports_counts_per_host() {
        let task = QuarantinedTask::new(opts(MOCK_RECON)).unwrap();
        let outcomes = task.update(&CancellationToken::new()).await;

        assert!(outcomes[0].error.is_none());
        assert_eq!(
            [&task.objects, &task.accounts, &task.containers].map(|gauge| value(gauge, &["10.0.0.2"])),
            [Some(3.0), Some(0.0), Some(1.0)]
        );
        assert_eq!(value(&task.objects, &["10.0.0.1"]), Some(0.0));
    }

    #[test]
    fn decodes_a_single_host_line() {
        let blocks = crate::transcript::split_per_host(
            b"-> http://10.0.0.1:6000/recon/quarantined: {'objects': 2, 'accounts': 0, 'containers': 1}\n",
        )
        .unwrap();
        let block = blocks.get("10.0.0.1").unwrap();
        let data: Quarantined = crate::transcript::decode(block).unwrap();
        assert_eq!(
            data,
            Quarantined {
                objects: 2,
                accounts: 0,
                containers: 1,
            }
        );
    }

    #[tokio::test]
    async fn unreachable_host_fails_the_query() {
        let task = QuarantinedTask::new(opts(MOCK_RECON_WITH_ERRORS)).unwrap();
        let outcomes = task.update(&CancellationToken::new()).await;

        let err = outcomes[0].error.as_ref().unwrap();
        assert_eq!(err.hostname.as_deref(), Some("10.0.0.2"));
        assert_eq!(err.output.as_deref(), Some("<urlopen error timed out>"));
        assert_eq!(value(&task.objects, &["10.0.0.1"]), Some(0.0));
        assert_eq!(value(&task.objects, &["10.0.0.2"]), None);
    }
}
