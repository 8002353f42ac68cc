use super::{
    flexible::FlexibleU64,
    ReconOpts,
};
use crate::{
    metrics::MetricSet,
    task::{
        Query,
        QueryOutcome,
        Task,
    },
};
use lazy_static::lazy_static;
use prometheus::{
    Gauge,
    GaugeVec,
};
use regex::Regex;
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
};
use tokio_util::sync::CancellationToken;

lazy_static! {
    static ref SPECIAL_CHARS: Regex = Regex::new("[^a-zA-Z0-9]+").expect("valid regex");
}

#[derive(Deserialize, Debug)]
struct Disk {
    #[serde(default)]
    device: String,
    #[serde(default)]
    avail: FlexibleU64,
    #[serde(default)]
    mounted: bool,
    #[serde(default)]
    used: FlexibleU64,
    #[serde(default)]
    size: FlexibleU64,
}

pub struct DiskUsageTask {
    opts: ReconOpts,
    args: Vec<String>,
    raw_capacity_bytes: Option<u64>,
    metrics: MetricSet,
    capacity_bytes: Gauge,
    free_bytes: Gauge,
    used_bytes: Gauge,
    fractional_usage: Gauge,
    fractional_usage_by_disk: GaugeVec,
}

impl DiskUsageTask {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        // The `percent` names are kept for dashboards built on earlier exporters, the values are fractions.
        Ok(Self {
            args: opts.args(None, "--diskusage"),
            opts,
            raw_capacity_bytes: None,
            capacity_bytes: metrics.gauge(
                "swift_cluster_storage_capacity_bytes",
                "Capacity storage bytes as reported by the swift-recon tool.",
            )?,
            free_bytes: metrics.gauge(
                "swift_cluster_storage_free_bytes",
                "Free storage bytes as reported by the swift-recon tool.",
            )?,
            used_bytes: metrics.gauge(
                "swift_cluster_storage_used_bytes",
                "Used storage bytes as reported by the swift-recon tool.",
            )?,
            fractional_usage: metrics.gauge(
                "swift_cluster_storage_used_percent",
                "Fractional usage as reported by the swift-recon tool.",
            )?,
            fractional_usage_by_disk: metrics.gauge_vec(
                "swift_cluster_storage_used_percent_by_disk",
                "Fractional usage of a disk as reported by the swift-recon tool.",
                &["storage_ip", "disk"],
            )?,
            metrics,
        })
    }

    /// Reports `capacity` as the cluster capacity instead of the sum of all mounted disks.
    pub fn with_raw_capacity(mut self, capacity: Option<u64>) -> Self {
        self.raw_capacity_bytes = capacity;
        self
    }
}

fn usage_ratio(used: u64, size: u64) -> f64 {
    if size == 0 {
        return 1.0;
    }
    used as f64 / size as f64
}

impl Task for DiskUsageTask {
    fn name(&self) -> &'static str {
        "recon-diskusage"
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::from_args(&self.args)]
    }

    fn update<'a>(&'a self, cancel: &'a CancellationToken) -> Pin<Box<dyn Future<Output = Vec<QueryOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let (mut total_free, mut total_used, mut total_size) = (0u64, 0u64, 0u64);
            let outcome = self
                .opts
                .query_per_host(&self.args, cancel, |host, disks: Vec<Disk>| {
                    for disk in disks.iter().filter(|disk| disk.mounted) {
                        total_free = total_free.saturating_add(disk.avail.0);
                        total_used = total_used.saturating_add(disk.used.0);
                        total_size = total_size.saturating_add(disk.size.0);

                        let device = SPECIAL_CHARS.replace_all(&disk.device, "");
                        self.fractional_usage_by_disk
                            .with_label_values(&[host, device.as_ref()])
                            .set(usage_ratio(disk.used.0, disk.size.0));
                    }
                })
                .await;

            if outcome.error.is_some() && total_size == 0 {
                // Nothing was collected, the previous totals stay.
                return vec![outcome];
            }

            let capacity = self.raw_capacity_bytes.unwrap_or(total_size);
            self.fractional_usage.set(usage_ratio(total_used, capacity).min(1.0));
            self.used_bytes.set(total_used as f64);
            self.free_bytes.set(total_free as f64);
            self.capacity_bytes.set(capacity as f64);
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
    async fn sums_mounted_disks_across_hosts() {
        let task = DiskUsageTask::new(opts(MOCK_RECON)).unwrap();
        let outcomes = task.update(&CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].error.is_none());
        assert_eq!(outcomes[0].query.as_str(), "--timeout=1 --diskusage --verbose");
        assert_eq!(task.capacity_bytes.get(), 167973008867328.0);
        assert_eq!(task.used_bytes.get(), 10421003354112.0);
        assert_eq!(task.free_bytes.get(), 157552005513216.0);
        assert_eq!(task.fractional_usage.get(), 10421003354112.0 / 167973008867328.0);
        assert_eq!(
            value(&task.fractional_usage_by_disk, &["10.0.0.1", "sdb14"]),
            Some(354174894080.0 / 5999036030976.0)
        );
        assert_eq!(value(&task.fractional_usage_by_disk, &["10.0.0.1", "sdb-14"]), None);
    }

    #[tokio::test]
    async fn unreachable_host_fails_the_query_but_keeps_the_rest() {
        let task = DiskUsageTask::new(opts(MOCK_RECON_WITH_ERRORS)).unwrap();
        let outcomes = task.update(&CancellationToken::new()).await;

        let err = outcomes[0].error.as_ref().unwrap();
        assert_eq!(err.hostname.as_deref(), Some("10.0.0.2"));
        assert_eq!(task.capacity_bytes.get(), 83986504433664.0);
        assert_eq!(task.used_bytes.get(), 5220752900096.0);
        assert!(value(&task.fractional_usage_by_disk, &["10.0.0.1", "sdb01"]).is_some());
        assert_eq!(value(&task.fractional_usage_by_disk, &["10.0.0.2", "sdb01"]), None);
    }

    #[tokio::test]
    async fn raw_capacity_replaces_the_summed_size() {
        let task = DiskUsageTask::new(opts(MOCK_RECON))
            .unwrap()
            .with_raw_capacity(Some(1_000));
        task.update(&CancellationToken::new()).await;

        assert_eq!(task.capacity_bytes.get(), 1000.0);
        assert_eq!(task.fractional_usage.get(), 1.0);
    }

    #[tokio::test]
    async fn unmounted_disks_are_left_out() {
        let task = DiskUsageTask::new(opts(MOCK_RECON_DEGRADED)).unwrap();
        let outcomes = task.update(&CancellationToken::new()).await;

        assert!(outcomes[0].error.is_none());
        assert_eq!(task.capacity_bytes.get(), 100.0);
        assert_eq!(task.used_bytes.get(), 50.0);
        assert_eq!(task.free_bytes.get(), 50.0);
        assert_eq!(task.fractional_usage.get(), 0.5);
        assert_eq!(value(&task.fractional_usage_by_disk, &["10.0.0.1", "sdb"]), Some(0.5));
        assert_eq!(value(&task.fractional_usage_by_disk, &["10.0.0.1", "sdc"]), None);
        assert_eq!(value(&task.fractional_usage_by_disk, &["10.0.0.2", "sdd"]), None);
    }

    #[tokio::test]
    async fn cluster_without_mounted_disks_is_full() {
        let task = DiskUsageTask::new(opts(MOCK_RECON_ALL_UNMOUNTED)).unwrap();
        let outcomes = task.update(&CancellationToken::new()).await;

        assert!(outcomes[0].error.is_none());
        assert_eq!(task.capacity_bytes.get(), 0.0);
        assert_eq!(task.used_bytes.get(), 0.0);
        assert_eq!(task.fractional_usage.get(), 1.0);
        assert_eq!(value(&task.fractional_usage_by_disk, &["10.0.0.1", "sdb"]), None);
    }

    #[test]
    fn empty_cluster_is_full() {
        assert_eq!(usage_ratio(0, 0), 1.0);
        assert_eq!(usage_ratio(25, 100), 0.25);
    }

    #[test]
    fn unmounted_and_lenient_disks_decode() {
        let disks: Vec<Disk> = crate::transcript::decode(
            b"[{u'device': u'sdb-01', u'mounted': False, u'used': None, u'size': u'12', u'avail': None}]",
        )
        .unwrap();
        assert!(!disks[0].mounted);
        assert_eq!(disks[0].size, FlexibleU64(12));
        assert_eq!(disks[0].used, FlexibleU64(0));
    }
}
