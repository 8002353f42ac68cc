use super::{
    ReconOpts,
    SWIFT_RECON,
};
use crate::{
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
        md5_blocks,
        split_per_host,
        TranscriptError,
    },
};
use prometheus::GaugeVec;
use std::{
    future::Future,
    pin::Pin,
};
use tokio_util::sync::CancellationToken;

/// How a host answered for one checksum kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Matched,
    NotMatched,
    Errored,
}

/// Host payloads come in four shapes:
///
/// 1. `{'/path/to/object.ring.gz': '<md5>', ...}`, the host's own sums
/// 2. `matches.`
/// 3. `(/path/to/object.ring.gz => <md5>) doesn't match on disk md5sum`
/// 4. any other error message
///
/// The first carries no verdict.
fn classify(payload: &[u8]) -> Option<Verdict> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    if text.is_empty() || transcript::is_structured(payload) {
        return None;
    }
    if text.ends_with("matches.") {
        Some(Verdict::Matched)
    } else if text.contains("doesn't match") || text.contains(r#"doesn"t match"#) {
        Some(Verdict::NotMatched)
    } else {
        Some(Verdict::Errored)
    }
}

pub struct Md5Task {
    opts: ReconOpts,
    args: Vec<String>,
    metrics: MetricSet,
    all: GaugeVec,
    errors: GaugeVec,
    matched: GaugeVec,
    not_matched: GaugeVec,
}

impl Md5Task {
    pub fn new(opts: ReconOpts) -> prometheus::Result<Self> {
        let mut metrics = MetricSet::default();
        Ok(Self {
            args: opts.args(None, "--md5"),
            opts,
            all: metrics.gauge_vec(
                "swift_cluster_md5_all",
                "Sum of matched-, not matched, and errored hosts while checking md5sum(s) as reported by the swift-recon tool.",
                &["kind"],
            )?,
            errors: metrics.gauge_vec(
                "swift_cluster_md5_errors",
                "Error encountered while checking host for md5sum(s) as reported by the swift-recon tool.",
                &["storage_ip", "kind"],
            )?,
            matched: metrics.gauge_vec(
                "swift_cluster_md5_matched",
                "Matched host for md5sum(s) reported by the swift-recon tool.",
                &["storage_ip", "kind"],
            )?,
            not_matched: metrics.gauge_vec(
                "swift_cluster_md5_not_matched",
                "Not matched host for md5sum(s) reported by the swift-recon tool.",
                &["storage_ip", "kind"],
            )?,
            metrics,
        })
    }

    async fn check(&self, cancel: &CancellationToken) -> Result<(), TaskError> {
        let output = self.opts.output(&self.args, cancel).await?;
        let blocks = md5_blocks(&output);
        if blocks.is_empty() {
            return Err(TaskError::new(SWIFT_RECON, &self.args, TranscriptError::NoUsableOutput)
                .with_output(String::from_utf8_lossy(&output)));
        }

        let mut failure = None;
        for block in blocks {
            let hosts = match split_per_host(&block.body) {
                Ok(hosts) => hosts,
                Err(err) => {
                    let err = TaskError::new(SWIFT_RECON, &self.args, err)
                        .with_output(String::from_utf8_lossy(&block.body));
                    info!(kind = %block.kind, error = %err, "skipping checksum block");
                    failure = Some(err);
                    continue;
                }
            };

            let mut all = 0u32;
            for host in &hosts {
                let Some(verdict) = classify(&host.payload) else {
                    continue;
                };
                all += 1;
                if verdict == Verdict::Errored {
                    let err = TaskError::new(SWIFT_RECON, &self.args, TaskErrorKind::Reported(host.payload_lossy()))
                        .with_host(&host.hostname);
                    debug!(kind = %block.kind, error = %err, "host could not be checked");
                    failure = Some(err);
                }

                let labels = [host.hostname.as_str(), block.kind.as_str()];
                let flag = |expected: Verdict| if verdict == expected { 1.0 } else { 0.0 };
                self.matched.with_label_values(&labels).set(flag(Verdict::Matched));
                self.not_matched.with_label_values(&labels).set(flag(Verdict::NotMatched));
                self.errors.with_label_values(&labels).set(flag(Verdict::Errored));
            }
            self.all.with_label_values(&[block.kind.as_str()]).set(f64::from(all));
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Task for Md5Task {
    fn name(&self) -> &'static str {
        "recon-md5"
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
            let outcome = match self.check(cancel).await {
                Ok(()) => QueryOutcome::success(query),
                Err(err) => QueryOutcome::failure(query, err),
            };
            vec![outcome]
        })
    }
}
