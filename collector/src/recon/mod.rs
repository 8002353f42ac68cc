//! Tasks built on `swift-recon`, one per recon check.

mod disk_usage;
mod drive_audit;
mod flexible;
mod md5;
mod quarantined;
mod replication;
mod sharding;
mod unmounted;
mod updater_sweep;

pub use disk_usage::DiskUsageTask;
pub use drive_audit::DriveAuditTask;
pub use md5::Md5Task;
pub use quarantined::QuarantinedTask;
pub use replication::ReplicationTask;
pub use sharding::ShardingTask;
pub use unmounted::UnmountedTask;
pub use updater_sweep::UpdaterSweepTask;

use crate::{
    command,
    error::TaskError,
    task::{
        Query,
        QueryOutcome,
    },
    transcript::{
        self,
        split_per_host,
        HostBlocks,
    },
};
use serde::de::DeserializeOwned;
use std::{
    path::PathBuf,
    time::Duration,
};
use strum::{
    Display,
    EnumIter,
};
use tokio_util::sync::CancellationToken;

pub const SWIFT_RECON: &str = "swift-recon";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ServerType {
    Account,
    Container,
    Object,
}

/// How every recon task invokes `swift-recon`.
#[derive(Debug, Clone)]
pub struct ReconOpts {
    pub executable: PathBuf,
    /// Passed on as `--timeout`, how long swift-recon waits for a single host.
    pub host_timeout: Duration,
    /// Upper bound for the whole invocation.
    pub timeout: Duration,
}

impl ReconOpts {
    /// swift-recon only takes whole seconds, partial ones are rounded up and
    /// zero becomes one.
    fn host_timeout_secs(&self) -> u64 {
        let secs = self.host_timeout.as_secs() + u64::from(self.host_timeout.subsec_nanos() > 0);
        secs.max(1)
    }

    /// `--timeout=<host timeout> [<server type>] <flag> --verbose`
    pub(crate) fn args(&self, server: Option<ServerType>, flag: &str) -> Vec<String> {
        let mut args = vec![format!("--timeout={}", self.host_timeout_secs())];
        args.extend(server.map(|server| server.to_string()));
        args.push(flag.to_string());
        args.push("--verbose".to_string());
        args
    }

    pub(crate) async fn output(&self, args: &[String], cancel: &CancellationToken) -> Result<Vec<u8>, TaskError> {
        command::run(&self.executable, args, self.timeout, cancel)
            .await
            .map_err(|err| TaskError::new(SWIFT_RECON, args, err))
    }

    pub(crate) async fn per_host(&self, args: &[String], cancel: &CancellationToken) -> Result<HostBlocks, TaskError> {
        let output = self.output(args, cancel).await?;
        split_per_host(&output)
            .map_err(|err| TaskError::new(SWIFT_RECON, args, err).with_output(String::from_utf8_lossy(&output)))
    }

    /// Runs one query and hands every host payload that decodes as `T` to `apply`.
    ///
    /// Hosts that do not decode are logged and skipped, their gauges keep the
    /// last known value and the query is reported as failed.
    pub(crate) async fn query_per_host<T, F>(&self, args: &[String], cancel: &CancellationToken, mut apply: F) -> QueryOutcome
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) + Send,
    {
        let query = Query::from_args(args);
        let hosts = match self.per_host(args, cancel).await {
            Ok(hosts) => hosts,
            Err(err) => return QueryOutcome::failure(query, err),
        };

        let mut failure = None;
        for block in &hosts {
            match transcript::decode::<T>(&block.payload) {
                Ok(data) => apply(&block.hostname, data),
                Err(err) => {
                    let err = TaskError::new(SWIFT_RECON, args, err)
                        .with_host(&block.hostname)
                        .with_output(block.payload_lossy());
                    info!(error = %err, "skipping host output");
                    failure = Some(err);
                }
            }
        }

        match failure {
            Some(err) => QueryOutcome::failure(query, err),
            None => QueryOutcome::success(query),
        }
    }
}
