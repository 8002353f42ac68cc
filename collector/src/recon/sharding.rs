use super::{
    flexible::{
        none_as_default,
        FlexibleF64,
    },
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
    collections::HashMap,
    future::Future,
    pin::Pin,
};
use tokio_util::sync::CancellationToken;

/// `(section, field, help)` of every per-host sharder counter.
const COUNTERS: &[(&str, &str, &str)] = &[
    ("audit_root", "attempted", "Container root DB auditor number attempted"),
    ("audit_root", "failure", "Container root DB auditor number of failures"),
    ("audit_root", "success", "Container root DB auditor number of successes"),
    ("audit_root", "has_overlap", "Container root DB auditor has_overlap"),
    ("audit_root", "num_overlap", "Container root DB auditor number of overlaps"),
    ("audit_shard", "attempted", "Container shard DB auditor number attempted"),
    ("audit_shard", "failure", "Container shard DB auditor number of failures"),
    ("audit_shard", "success", "Container shard DB auditor number of successes"),
    ("cleaved", "attempted", "Container shard cleaved number attempted"),
    ("cleaved", "failure", "Container shard cleaved number of failures"),
    ("cleaved", "max_time", "Container shard cleaved max_time"),
    ("cleaved", "min_time", "Container shard cleaved min_time"),
    ("cleaved", "success", "Container shard cleaved number of successes"),
    ("created", "attempted", "Container shard created number attempted"),
    ("created", "failure", "Container shard created number of failures"),
    ("created", "success", "Container shard created number of successes"),
    ("misplaced", "attempted", "Container sharding stats on misplaced objects number attempted"),
    ("misplaced", "failure", "Container sharding stats on misplaced objects number of failures"),
    ("misplaced", "found", "Container sharding stats on misplaced objects number found"),
    ("misplaced", "placed", "Container sharding stats on misplaced objects number placed"),
    ("misplaced", "success", "Container sharding stats on misplaced objects number of successes"),
    ("misplaced", "unplaced", "Container sharding stats on misplaced objects number unplaced"),
    ("scanned", "attempted", "Container shard scanned number attempted"),
    ("scanned", "failure", "Container shard scanned number of failures"),
    ("scanned", "max_time", "Container shard scanned max_time"),
    ("scanned", "min_time", "Container shard scanned min_time"),
    ("scanned", "success", "Container shard scanned number of successes"),
    ("visited", "attempted", "Container shard visited number attempted"),
    ("visited", "completed", "Container shard visited number completed"),
    ("visited", "failure", "Container shard visited number of failures"),
    ("visited", "skipped", "Container shard visited number skipped"),
    ("visited", "success", "Container shard visited number of successes"),
];

type Counters = HashMap<String, FlexibleF64>;

#[derive(Deserialize, Debug)]
struct Host {
    #[serde(default, deserialize_with = "none_as_default")]
    sharding_stats: Option<ShardingStats>,
}

#[derive(Deserialize, Debug, Default)]
struct ShardingStats {
    #[serde(default, deserialize_with = "none_as_default")]
    sharding: Sharding,
}

#[derive(Deserialize, Debug, Default)]
struct Sharding {
    #[serde(default)]
    audit_root: Counters,
    #[serde(default)]
    audit_shard: Counters,
    #[serde(default)]
    cleaved: Counters,
    #[serde(default)]
    created: Counters,
    #[serde(default)]
    misplaced: Counters,
    #[serde(default)]
    scanned: Counters,
    #[serde(default)]
    visited: Counters,
    #[serde(default, deserialize_with = "none_as_default")]
    sharding_in_progress: InProgress,
    #[serde(default, deserialize_with = "none_as_default")]
    sharding_candidates: Candidates,
}

impl Sharding {
    fn section(&self, name: &str) -> Option<&Counters> {
        match name {
            "audit_root" => Some(&self.audit_root),
            "audit_shard" => Some(&self.audit_shard),
            "cleaved" => Some(&self.cleaved),
            "created" => Some(&self.created),
            "misplaced" => Some(&self.misplaced),
            "scanned" => Some(&self.scanned),
            "visited" => Some(&self.visited),
            _ => None,
        }
    }

    fn counter(&self, section: &str, field: &str) -> f64 {
        self.section(section)
            .and_then(|counters| counters.get(field))
            .map_or(0.0, |value| value.0)
    }
}

#[derive(Deserialize, Debug, Default)]
struct InProgress {
    #[serde(default)]
    all: Vec<ShardInProgress>,
}

#[derive(Deserialize, Debug)]
struct ShardInProgress {
    #[serde(default)]
    account: String,
    #[serde(default)]
    container: String,
    #[serde(default)]
    active: FlexibleF64,
    #[serde(default)]
    cleaved: FlexibleF64,
    #[serde(default)]
    created: FlexibleF64,
    #[serde(default)]
    found: FlexibleF64,
    #[serde(default)]
    object_count: FlexibleF64,
    #[serde(default)]
    error: Option<String>,
}

impl ShardInProgress {
    fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|error| error != "None")
    }
}

#[derive(Deserialize, Debug, Default)]
struct Candidates {
    #[serde(default)]
    found: FlexibleF64,
    #[serde(default)]
    top: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    account: String,
    #[serde(default)]
    container: String,
    #[serde(default)]
    object_count: FlexibleF64,
}

struct CounterGauge {
    section: &'static str,
    field: &'static str,
    gauge: GaugeVec,
}

struct InProgressGauges {
    active: GaugeVec,
    cleaved: GaugeVec,
    created: GaugeVec,
    error: GaugeVec,
    found: GaugeVec,
    object_count: GaugeVec,
}

pub struct ShardingTask {
    opts: ReconOpts,
    args: Vec<String>,
    metrics: MetricSet,
    counters: Vec<CounterGauge>,
    in_progress: InProgressGauges,
    candidates_found: GaugeVec,
    candidates_object_count: GaugeVec,
}

impl ShardingTask {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();

        let mut counters = Vec::with_capacity(COUNTERS.len());
        for &(section, field, help) in COUNTERS {
            counters.push(CounterGauge {
                section,
                field,
                gauge: metrics.gauge_vec(
                    &format!("swift_cluster_containers_sharding_{section}_{field}"),
                    &format!("{help} reported by the swift-recon tool."),
                    &["storage_ip"],
                )?,
            });
        }

        let mut in_progress = |field: &str, help: &str| {
            metrics.gauge_vec(
                &format!("swift_cluster_containers_sharding_in_progress_{field}"),
                &format!("Container sharding in progress {help} reported by the swift-recon tool."),
                &["storage_ip", "container", "account"],
            )
        };
        let in_progress = InProgressGauges {
            active: in_progress("active", "number of shards active")?,
            cleaved: in_progress("cleaved", "number of shards cleaved")?,
            created: in_progress("created", "number of shards created")?,
            error: in_progress("error", "number of errors")?,
            found: in_progress("found", "number found")?,
            object_count: in_progress("object_count", "object count")?,
        };

        Ok(Self {
            args: opts.args(Some(ServerType::Container), "--sharding"),
            opts,
            counters,
            in_progress,
            candidates_found: metrics.gauge_vec(
                "swift_cluster_containers_sharding_candidates_found",
                "Number of container sharding candidates reported by the swift-recon tool.",
                &["storage_ip"],
            )?,
            candidates_object_count: metrics.gauge_vec(
                "swift_cluster_containers_sharding_candidates_object_count",
                "Container sharding candidates object count reported by the swift-recon tool.",
                &["storage_ip", "account", "container"],
            )?,
            metrics,
        })
    }

    fn record(&self, host: &str, sharding: &Sharding) {
        for counter in &self.counters {
            counter
                .gauge
                .with_label_values(&[host])
                .set(sharding.counter(counter.section, counter.field));
        }

        for shard in &sharding.sharding_in_progress.all {
            let labels = [host, shard.container.as_str(), shard.account.as_str()];
            let gauges = &self.in_progress;
            gauges.active.with_label_values(&labels).set(shard.active.0);
            gauges.cleaved.with_label_values(&labels).set(shard.cleaved.0);
            gauges.created.with_label_values(&labels).set(shard.created.0);
            gauges.error.with_label_values(&labels).set(if shard.has_error() { 1.0 } else { 0.0 });
            gauges.found.with_label_values(&labels).set(shard.found.0);
            gauges.object_count.with_label_values(&labels).set(shard.object_count.0);
        }

        let candidates = &sharding.sharding_candidates;
        self.candidates_found.with_label_values(&[host]).set(candidates.found.0);
        for candidate in &candidates.top {
            self.candidates_object_count
                .with_label_values(&[host, candidate.account.as_str(), candidate.container.as_str()])
                .set(candidate.object_count.0);
        }
    }
}

impl Task for ShardingTask {
    fn name(&self) -> &'static str {
        "recon-sharding"
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
                .query_per_host(&self.args, cancel, |host, data: Host| match data.sharding_stats {
                    Some(stats) => self.record(host, &stats.sharding),
                    None => debug!(host, "no sharder stats reported"),
                })
                .await;
            vec![outcome]
        })
    }
}
