#[macro_use]
extern crate tracing;

mod app_config;
mod args;

use app_config::AppConfig;
pub use app_config::get_config_dir;
pub use args::Args;
use color_eyre::Result;
use eyre::Context as _;
use serde::{
    Deserialize,
    Deserializer,
};
use std::{
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

pub const SWIFT_RECON: &str = "swift-recon";
pub const SWIFT_DISPERSION_REPORT: &str = "swift-dispersion-report";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub app_config: AppConfig,
    pub listen_address: SocketAddr,
    pub max_failures: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub scrape_interval: Duration,
    pub recon: ReconConfig,
    pub dispersion: DispersionConfig,
    #[serde(default)]
    pub disk_usage: DiskUsageConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReconConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub host_timeout: Duration,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub collectors: ReconCollectors,
}

/// Which `swift-recon` categories get scraped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ReconCollectors {
    #[serde(default)]
    pub md5: bool,
    #[serde(default)]
    pub diskusage: bool,
    #[serde(default)]
    pub driveaudit: bool,
    #[serde(default)]
    pub quarantined: bool,
    #[serde(default)]
    pub replication: bool,
    #[serde(default)]
    pub unmounted: bool,
    #[serde(default)]
    pub updater_sweep_time: bool,
    #[serde(default)]
    pub sharding: bool,
}

impl ReconCollectors {
    pub fn any(&self) -> bool {
        self.md5
            || self.diskusage
            || self.driveaudit
            || self.quarantined
            || self.replication
            || self.unmounted
            || self.updater_sweep_time
            || self.sharding
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DispersionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DiskUsageConfig {
    #[serde(default)]
    pub raw_capacity_bytes: Option<u64>,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

/// Accepts humantime strings (`4s`, `1m 30s`) and plain numbers of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    humantime::parse_duration(value)
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let value = String::deserialize(deserializer)?;
    parse_duration(&value).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        Self::load(args, &get_config_dir())
    }

    /// Embedded defaults, then `<config_dir>/config.yaml`, then `args`.
    pub fn load(args: Args, config_dir: &Path) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("config_dir", config_dir.to_string_lossy().as_ref())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    /// Refuses a configuration that would export nothing.
    pub fn validate(&self) -> Result<()> {
        if !self.recon.collectors.any() && !self.dispersion.enabled {
            eyre::bail!("no collector enabled");
        }
        Ok(())
    }

    /// `swift-recon` to run, or `None` when no recon collector is enabled.
    #[instrument(level = "debug", skip(self))]
    pub fn recon_executable(&self) -> Result<Option<PathBuf>> {
        if !self.recon.collectors.any() {
            return Ok(None);
        }
        executable(self.recon.path.as_deref(), SWIFT_RECON).map(Some)
    }

    /// `swift-dispersion-report` to run, or `None` when dispersion is disabled.
    #[instrument(level = "debug", skip(self))]
    pub fn dispersion_executable(&self) -> Result<Option<PathBuf>> {
        if !self.dispersion.enabled {
            return Ok(None);
        }
        executable(self.dispersion.path.as_deref(), SWIFT_DISPERSION_REPORT).map(Some)
    }
}

/// A configured path is taken as is, otherwise `name` is looked up in `PATH`
/// once at startup so a missing tool stops the exporter early.
fn executable(configured: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = configured.filter(|path| !path.as_os_str().is_empty()) {
        debug!(?path, "using configured executable");
        return Ok(path.to_path_buf());
    }
    which::which(name).wrap_err_with(|| format!("{name} could not be found in PATH"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn args(flags: &[&str]) -> Args {
        let mut args = Args::try_parse_from(std::iter::once("swift-health-exporter").chain(flags.iter().copied())).unwrap();
        // Keep the host environment out of the assertions.
        args.recon_path = None;
        args.dispersion_path = None;
        args
    }

    #[test]
    fn defaults_enable_md5_only() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(args(&[]), dir.path()).unwrap();

        assert_eq!(config.listen_address, "0.0.0.0:9520".parse().unwrap());
        assert_eq!(config.max_failures, 4);
        assert_eq!(config.scrape_interval, Duration::from_secs(60));
        assert_eq!(config.recon.timeout, Duration::from_secs(4));
        assert_eq!(config.recon.host_timeout, Duration::from_secs(1));
        assert_eq!(
            config.recon.collectors,
            ReconCollectors {
                md5: true,
                ..Default::default()
            }
        );
        assert!(!config.dispersion.enabled);
        assert_eq!(config.dispersion.timeout, Duration::from_secs(20));
        assert_eq!(config.disk_usage.raw_capacity_bytes, None);
        assert_eq!(config.app_config.config_dir, dir.path());
        config.validate().unwrap();
    }

    #[test]
    fn embedded_defaults_parse() {
        let config = Config::default();
        assert_eq!(config.max_failures, 4);
        assert!(config.recon.collectors.md5);
    }

    #[test]
    fn args_override_the_config_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "max_failures: 2\nrecon:\n  timeout: 8s\n  collectors:\n    replication: true\ndisk_usage:\n  raw_capacity_bytes: 1000\n",
        )
        .unwrap();

        let config = Config::load(
            args(&["--max-failures=6", "--collector.recon.unmounted", "--collector.dispersion"]),
            dir.path(),
        )
        .unwrap();

        assert_eq!(config.max_failures, 6);
        assert_eq!(config.recon.timeout, Duration::from_secs(8));
        assert_eq!(config.recon.host_timeout, Duration::from_secs(1));
        assert!(config.recon.collectors.md5);
        assert!(config.recon.collectors.replication);
        assert!(config.recon.collectors.unmounted);
        assert!(!config.recon.collectors.sharding);
        assert!(config.dispersion.enabled);
        assert_eq!(config.disk_usage.raw_capacity_bytes, Some(1000));
    }

    #[test]
    fn nothing_enabled_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(args(&["--no-collector.recon.md5"]), dir.path()).unwrap();

        assert!(!config.recon.collectors.any());
        assert_eq!(config.validate().unwrap_err().to_string(), "no collector enabled");
        assert_eq!(config.recon_executable().unwrap(), None);
        assert_eq!(config.dispersion_executable().unwrap(), None);
    }

    #[test]
    fn configured_paths_skip_the_lookup() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(args(&["--collector.dispersion"]), dir.path()).unwrap();
        config.recon.path = Some(PathBuf::from("/opt/swift/bin/swift-recon"));
        config.dispersion.path = Some(PathBuf::from("/opt/swift/bin/swift-dispersion-report"));

        assert_eq!(
            config.recon_executable().unwrap(),
            Some(PathBuf::from("/opt/swift/bin/swift-recon"))
        );
        assert_eq!(
            config.dispersion_executable().unwrap(),
            Some(PathBuf::from("/opt/swift/bin/swift-dispersion-report"))
        );
    }

    #[test]
    fn durations_accept_plain_seconds() {
        assert_eq!(parse_duration("20").unwrap(), Duration::from_secs(20));
        assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("-1").is_err());
    }
}
