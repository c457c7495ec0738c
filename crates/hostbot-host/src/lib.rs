//! Host adapters: container engine, service manager, package manager, power
//! control and the metric sampler.

pub mod apt;
pub mod command;
pub mod docker;
pub mod power;
pub mod systemd;
pub mod telemetry;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use hostbot_core::{
    callback::PowerOp,
    config::Config,
    domain::ContainerId,
    host::{Container, HostControl, LifecycleOp, ServiceEntry},
    Error, Result,
};
use tracing::{info, warn};

use crate::{
    command::{run_checked, CommandRunner, ProcessRunner},
    docker::DockerCli,
    systemd::ListStrategy,
};

pub use telemetry::SysinfoTelemetry;

#[derive(Clone, Debug)]
pub struct HostOptions {
    pub use_sudo: bool,
    pub docker_socket: String,
    pub docker_timeout: Duration,
    pub log_tail_lines: u32,
}

impl HostOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            use_sudo: cfg.host.use_sudo,
            docker_socket: cfg.docker.socket.clone(),
            docker_timeout: cfg.docker_timeout(),
            log_tail_lines: cfg.host.log_tail_lines,
        }
    }
}

/// [`HostControl`] over the local CLIs.
pub struct HostSurface {
    runner: Arc<dyn CommandRunner>,
    docker: DockerCli,
    log_tail_lines: u32,
    docker_timeout: Duration,
}

impl HostSurface {
    pub fn new(opts: &HostOptions) -> Self {
        Self::with_runner(opts, Arc::new(ProcessRunner::new(opts.use_sudo)))
    }

    pub fn with_runner(opts: &HostOptions, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            docker: DockerCli::new(&opts.docker_socket),
            log_tail_lines: opts.log_tail_lines,
            docker_timeout: opts.docker_timeout,
        }
    }

    /// Check that the container engine answers within the configured timeout.
    /// Returns the server version.
    pub async fn probe_docker(&self) -> Result<String> {
        let inv = self.docker.info();
        let version = tokio::time::timeout(self.docker_timeout, run_checked(&*self.runner, &inv))
            .await
            .map_err(|_| {
                Error::command(
                    "docker",
                    format!("no answer within {}s", self.docker_timeout.as_secs()),
                )
            })??;
        Ok(version.trim().to_string())
    }

    /// Startup check; a missing engine only disables the container views.
    pub async fn log_docker_availability(&self) {
        match self.probe_docker().await {
            Ok(version) => info!(version = %version, "container engine available"),
            Err(e) => warn!(error = %e, "container engine unavailable"),
        }
    }
}

#[async_trait]
impl HostControl for HostSurface {
    async fn list_containers(&self, filter: Option<&ContainerId>) -> Result<Vec<Container>> {
        let stdout = run_checked(&*self.runner, &self.docker.list(filter)).await?;
        Ok(docker::parse_containers_output(&stdout))
    }

    async fn container_lifecycle(&self, op: LifecycleOp, id: &ContainerId) -> Result<()> {
        run_checked(&*self.runner, &self.docker.lifecycle(op, id)).await?;
        Ok(())
    }

    async fn container_logs(&self, id: &ContainerId) -> Result<String> {
        let inv = self.docker.logs(id, self.log_tail_lines);
        let out = self.runner.run(&inv).await?;
        if !out.success() {
            return Err(command::failure(&inv, &out));
        }
        // The engine replays the container's stderr on our stderr.
        let mut logs = out.stdout;
        if !out.stderr.is_empty() {
            if !logs.is_empty() && !logs.ends_with('\n') {
                logs.push('\n');
            }
            logs.push_str(&out.stderr);
        }
        Ok(logs)
    }

    async fn list_services(&self) -> Result<Vec<ServiceEntry>> {
        systemd::list_services(&*self.runner, &ListStrategy::CHAIN).await
    }

    async fn service_lifecycle(&self, op: LifecycleOp, name: &str) -> Result<()> {
        run_checked(&*self.runner, &systemd::lifecycle(op, name)).await?;
        Ok(())
    }

    async fn service_status(&self, name: &str) -> Result<String> {
        systemd::service_status(&*self.runner, name).await
    }

    async fn power(&self, op: PowerOp) -> Result<()> {
        run_checked(&*self.runner, &power::invocation(op)).await?;
        Ok(())
    }

    async fn check_updates(&self) -> Result<String> {
        apt::check_updates(&*self.runner).await
    }

    async fn upgrade_system(&self) -> Result<()> {
        apt::upgrade(&*self.runner).await
    }
}
