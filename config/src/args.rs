use crate::parse_duration;
use clap::Parser;
use std::{
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};

/// Prometheus exporter for the health of a Swift cluster.
///
/// Only the flags given on the command line (or through their environment
/// variables) override the configuration file.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Address the metrics endpoint listens on.
    #[arg(long = "web.listen-address", value_name = "ADDR")]
    pub listen_address: Option<SocketAddr>,

    /// Consecutive failed scrapes before a query reports a non-zero exit code.
    #[arg(long = "max-failures", value_name = "N")]
    pub max_failures: Option<u32>,

    /// Time between two scrapes, e.g. `30s` or `2m`.
    #[arg(long = "scrape-interval", value_name = "DURATION", value_parser = parse_duration)]
    pub scrape_interval: Option<Duration>,

    /// Timeout for a whole swift-recon run (plain numbers are seconds).
    #[arg(long = "recon.timeout", value_name = "DURATION", value_parser = parse_duration)]
    pub recon_timeout: Option<Duration>,

    /// Per-host timeout passed to swift-recon (plain numbers are seconds).
    #[arg(long = "recon.timeout-host", value_name = "DURATION", value_parser = parse_duration)]
    pub recon_host_timeout: Option<Duration>,

    #[arg(long = "recon.path", value_name = "FILE", env = "SWIFT_RECON_PATH")]
    pub recon_path: Option<PathBuf>,

    /// Disable the ring and swift.conf checksum collector.
    #[arg(long = "no-collector.recon.md5")]
    pub no_recon_md5: bool,

    /// Enable the disk usage collector.
    #[arg(long = "collector.recon.diskusage")]
    pub recon_diskusage: bool,

    /// Enable the drive audit collector.
    #[arg(long = "collector.recon.driveaudit")]
    pub recon_driveaudit: bool,

    /// Enable the quarantined collector.
    #[arg(long = "collector.recon.quarantined")]
    pub recon_quarantined: bool,

    /// Enable the replication collector.
    #[arg(long = "collector.recon.replication")]
    pub recon_replication: bool,

    /// Enable the unmounted drives collector.
    #[arg(long = "collector.recon.unmounted")]
    pub recon_unmounted: bool,

    /// Enable the updater sweep time collector.
    #[arg(long = "collector.recon.updater_sweep_time")]
    pub recon_updater_sweep_time: bool,

    /// Enable the container sharding collector.
    #[arg(long = "collector.recon.sharding")]
    pub recon_sharding: bool,

    /// Report this many bytes as the cluster capacity instead of the summed disk sizes.
    #[arg(long = "collector.recon.diskusage.raw-capacity-bytes", value_name = "BYTES")]
    pub raw_capacity_bytes: Option<u64>,

    /// Enable the dispersion report collector.
    #[arg(long = "collector.dispersion")]
    pub dispersion: bool,

    /// Timeout for a swift-dispersion-report run (plain numbers are seconds).
    #[arg(long = "dispersion.timeout", value_name = "DURATION", value_parser = parse_duration)]
    pub dispersion_timeout: Option<Duration>,

    #[arg(long = "dispersion.path", value_name = "FILE", env = "SWIFT_DISPERSION_REPORT_PATH")]
    pub dispersion_path: Option<PathBuf>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    fn duration(value: Duration) -> Value {
        humantime::format_duration(value).to_string().into()
    }

    fn path(value: &std::path::Path) -> Value {
        value.to_string_lossy().into_owned().into()
    }

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(listen_address) = self.listen_address {
                cache.insert("listen_address".to_string(), listen_address.to_string().into());
            }
            if let Some(max_failures) = self.max_failures {
                cache.insert("max_failures".to_string(), u64::from(max_failures).into());
            }
            if let Some(scrape_interval) = self.scrape_interval {
                cache.insert("scrape_interval".to_string(), duration(scrape_interval));
            }
            if let Some(timeout) = self.recon_timeout {
                cache.insert("recon.timeout".to_string(), duration(timeout));
            }
            if let Some(host_timeout) = self.recon_host_timeout {
                cache.insert("recon.host_timeout".to_string(), duration(host_timeout));
            }
            if let Some(recon_path) = &self.recon_path {
                cache.insert("recon.path".to_string(), path(recon_path));
            }
            if self.no_recon_md5 {
                cache.insert("recon.collectors.md5".to_string(), false.into());
            }
            for (name, enabled) in [
                ("diskusage", self.recon_diskusage),
                ("driveaudit", self.recon_driveaudit),
                ("quarantined", self.recon_quarantined),
                ("replication", self.recon_replication),
                ("unmounted", self.recon_unmounted),
                ("updater_sweep_time", self.recon_updater_sweep_time),
                ("sharding", self.recon_sharding),
            ] {
                if enabled {
                    cache.insert(format!("recon.collectors.{name}"), true.into());
                }
            }
            if let Some(raw_capacity_bytes) = self.raw_capacity_bytes {
                cache.insert("disk_usage.raw_capacity_bytes".to_string(), raw_capacity_bytes.into());
            }
            if self.dispersion {
                cache.insert("dispersion.enabled".to_string(), true.into());
            }
            if let Some(timeout) = self.dispersion_timeout {
                cache.insert("dispersion.timeout".to_string(), duration(timeout));
            }
            if let Some(dispersion_path) = &self.dispersion_path {
                cache.insert("dispersion.path".to_string(), path(dispersion_path));
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let version = clap::crate_version!();
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "\
{version}

Authors: {author}

Config directory: {config_dir_path}"
    )
}
