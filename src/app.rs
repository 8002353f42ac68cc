use color_eyre::Result;
use eyre::Context as _;
use prometheus::Registry;
use std::sync::Arc;
use swift_health_exporter_collector::{
    add_task,
    dispersion::{
        DispersionOpts,
        DispersionTask,
    },
    recon::{
        DiskUsageTask,
        DriveAuditTask,
        Md5Task,
        QuarantinedTask,
        ReconOpts,
        ReplicationTask,
        ShardingTask,
        UnmountedTask,
        UpdaterSweepTask,
    },
    Collector,
    ExitCodeGauge,
    Scraper,
    SystemClock,
    Task,
};
use swift_health_exporter_config::{
    Args,
    Config,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        Self::with_config(Config::new(args)?)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Creates every enabled task and wires it into a fresh collector and scraper.
    fn build(&self) -> Result<(Collector, Scraper)> {
        let mut collector = Collector::default();
        let mut scraper = Scraper::new(self.config.max_failures).with_interval(self.config.scrape_interval);

        if let Some(executable) = self.config.recon_executable()? {
            let opts = ReconOpts {
                executable,
                host_timeout: self.config.recon.host_timeout,
                timeout: self.config.recon.timeout,
            };
            let enabled = &self.config.recon.collectors;
            let mut tasks: Vec<Arc<dyn Task>> = Vec::new();
            if enabled.diskusage {
                let task = DiskUsageTask::new(opts.clone())?.with_raw_capacity(self.config.disk_usage.raw_capacity_bytes);
                tasks.push(Arc::new(task));
            }
            if enabled.driveaudit {
                tasks.push(Arc::new(DriveAuditTask::new(opts.clone())?));
            }
            if enabled.md5 {
                tasks.push(Arc::new(Md5Task::new(opts.clone())?));
            }
            if enabled.quarantined {
                tasks.push(Arc::new(QuarantinedTask::new(opts.clone())?));
            }
            if enabled.replication {
                tasks.push(Arc::new(ReplicationTask::new(opts.clone(), Arc::new(SystemClock))?));
            }
            if enabled.unmounted {
                tasks.push(Arc::new(UnmountedTask::new(opts.clone())?));
            }
            if enabled.updater_sweep_time {
                tasks.push(Arc::new(UpdaterSweepTask::new(opts.clone())?));
            }
            if enabled.sharding {
                tasks.push(Arc::new(ShardingTask::new(opts)?));
            }

            let exit_code = ExitCodeGauge::recon()?;
            for task in tasks {
                add_task(&mut collector, &mut scraper, task, exit_code.clone());
            }
        }

        if let Some(executable) = self.config.dispersion_executable()? {
            let task = DispersionTask::new(DispersionOpts {
                executable,
                timeout: self.config.dispersion.timeout,
            })?;
            add_task(&mut collector, &mut scraper, Arc::new(task), ExitCodeGauge::dispersion()?);
        }

        info!(tasks = ?collector.task_names(), "collectors enabled");
        Ok((collector, scraper))
    }

    pub async fn run(self) -> Result<()> {
        let (collector, scraper) = self.build()?;
        let registry = Registry::new();
        registry.register(Box::new(collector))?;

        let listener = TcpListener::bind(self.config.listen_address)
            .await
            .wrap_err_with(|| format!("Failed to listen on {}", self.config.listen_address))?;

        let cancel = CancellationToken::new();
        let scraper = tokio::spawn(scraper.run(cancel.clone()));
        tokio::spawn(cancel_on_signal(cancel.clone()));

        let served = swift_health_exporter_http::serve(listener, registry, cancel.clone()).await;
        cancel.cancel();
        scraper.await.context("scraper task failed")?;
        served
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!("cannot listen for ctrl-c: {err}");
                return;
            }
        }
        _ = terminate => {}
    }
    info!("shutting down");
    cancel.cancel();
}
