//! Host Control Surface port: container engine, service manager, package
//! manager and power control.
//!
//! Every call is one-shot. No local state about the resources is tracked; the
//! actual state is whatever the external system reports next time.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{callback::PowerOp, domain::ContainerId, Result};

/// One-shot lifecycle verb shared by containers and services.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleOp {
    Start,
    Stop,
    Restart,
}

impl LifecycleOp {
    /// CLI sub-command for both the container engine and the service manager.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub status: String,
    pub image: String,
    /// Epoch when the engine reported an unparsable timestamp.
    pub created: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Unit name without the `.service` suffix.
    pub name: String,
    pub active: bool,
}

impl ServiceEntry {
    pub fn active(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
        }
    }

    /// Button label with a colored status indicator.
    pub fn label(&self) -> String {
        let dot = if self.active { "🟩" } else { "🟥" };
        format!("{dot} {}", self.name)
    }
}

#[async_trait]
pub trait HostControl: Send + Sync {
    /// All containers, or only the ones matching `filter` by id.
    async fn list_containers(&self, filter: Option<&ContainerId>) -> Result<Vec<Container>>;

    async fn container_lifecycle(&self, op: LifecycleOp, id: &ContainerId) -> Result<()>;

    /// Tail of the container's log.
    async fn container_logs(&self, id: &ContainerId) -> Result<String>;

    async fn list_services(&self) -> Result<Vec<ServiceEntry>>;

    async fn service_lifecycle(&self, op: LifecycleOp, name: &str) -> Result<()>;

    /// Raw status text as printed by the service manager.
    async fn service_status(&self, name: &str) -> Result<String>;

    async fn power(&self, op: PowerOp) -> Result<()>;

    /// Refreshes package indexes and returns the raw upgradable-package listing.
    async fn check_updates(&self) -> Result<String>;

    async fn upgrade_system(&self) -> Result<()>;
}

/// Number of upgradable packages in an `apt list --upgradable` listing.
///
/// Package lines look like `name/suite version arch [upgradable from: x]`; the
/// `Listing...` header and blank lines do not count.
pub fn count_upgradable_packages(listing: &str) -> usize {
    listing
        .lines()
        .filter(|line| line.contains('/') && !line.starts_with("Listing..."))
        .count()
}
