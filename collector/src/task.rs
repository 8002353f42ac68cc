use crate::{
    error::TaskError,
    metrics::MetricSet,
};
use derive_more::{
    Deref,
    Display,
};
use prometheus::{
    core::Desc,
    proto::MetricFamily,
};
use std::{
    future::Future,
    pin::Pin,
};
use tokio_util::sync::CancellationToken;

/// The command line of one invocation, used to correlate outcomes and as the
/// `query` label of the exit code gauges.
#[derive(Debug, Display, Deref, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Query(String);

impl Query {
    pub fn from_args(args: &[String]) -> Self {
        Self(args.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    pub fn as_f64(self) -> f64 {
        self as u8 as f64
    }
}

/// What happened to one query during an update.
#[derive(Debug)]
pub struct QueryOutcome {
    pub query: Query,
    pub error: Option<TaskError>,
}

impl QueryOutcome {
    pub fn success(query: Query) -> Self {
        Self { query, error: None }
    }

    pub fn failure(query: Query, error: TaskError) -> Self {
        Self {
            query,
            error: Some(error),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.error {
            Some(_) => ExitCode::Failure,
            None => ExitCode::Success,
        }
    }
}

/// One diagnostic category.
///
/// A task owns its gauges. Only [`Task::update`] writes them, the read path
/// goes through [`Task::describe`] and [`Task::collect`] which never run a
/// command.
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    fn metrics(&self) -> &MetricSet;

    /// Every query signature [`Task::update`] can report on.
    fn queries(&self) -> Vec<Query>;

    /// Runs the task's queries one after another and updates the gauges in
    /// place. Returns one outcome per query, a failed host or query never
    /// stops the others.
    fn update<'a>(&'a self, cancel: &'a CancellationToken) -> Pin<Box<dyn Future<Output = Vec<QueryOutcome>> + Send + 'a>>;

    fn describe(&self) -> Vec<&Desc> {
        self.metrics().desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.metrics().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskErrorKind;

    #[test]
    fn query_is_the_joined_command_line() {
        let args = ["--timeout=1", "object", "--replication", "--verbose"].map(String::from);
        let query = Query::from_args(&args);
        assert_eq!(query.to_string(), "--timeout=1 object --replication --verbose");
        assert!(query.starts_with("--timeout=1"));
    }

    #[test]
    fn exit_code_follows_error() {
        let query = Query::from_args(&["--md5".to_string()]);
        assert_eq!(QueryOutcome::success(query.clone()).exit_code(), ExitCode::Success);

        let err = TaskError::new("swift-recon", &[], TaskErrorKind::Reported("boom".to_string()));
        let failed = QueryOutcome::failure(query, err);
        assert_eq!(failed.exit_code(), ExitCode::Failure);
        assert_eq!(failed.exit_code().as_f64(), 1.0);
    }
}
