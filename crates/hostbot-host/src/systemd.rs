//! Service manager (systemd).
//!
//! Listing tries a structured query over the system bus first and falls back
//! to parsing `systemctl list-units` text. Only running services are listed in
//! either case.

use hostbot_core::{
    host::{LifecycleOp, ServiceEntry},
    Error, Result,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::command::{run_checked, CommandRunner, Invocation};

const UNIT_SUFFIX: &str = ".service";

/// `systemctl status` exits 3 for a unit that is loaded but not running; the
/// report is still what the user asked for.
const STATUS_NOT_RUNNING: i32 = 3;

fn unit(name: &str) -> String {
    format!("{name}{UNIT_SUFFIX}")
}

pub fn lifecycle(op: LifecycleOp, name: &str) -> Invocation {
    Invocation::new("systemctl", [op.as_str().to_string(), unit(name)]).privileged()
}

pub fn status(name: &str) -> Invocation {
    Invocation::new("systemctl", ["status".to_string(), "--no-pager".to_string(), unit(name)])
        .privileged()
}

/// Run `systemctl status`, accepting the "not running" exit code.
pub async fn service_status(runner: &dyn CommandRunner, name: &str) -> Result<String> {
    let inv = status(name);
    let out = runner.run(&inv).await?;
    match out.code {
        Some(0) | Some(STATUS_NOT_RUNNING) => Ok(out.stdout),
        _ => Err(crate::command::failure(&inv, &out)),
    }
}

/// One way of obtaining the running-service list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListStrategy {
    /// `org.freedesktop.systemd1.Manager.ListUnits` via `busctl --json`.
    BusQuery,
    /// `systemctl list-units --type=service --state=running`.
    ListUnitsText,
}

impl ListStrategy {
    pub const CHAIN: [ListStrategy; 2] = [ListStrategy::BusQuery, ListStrategy::ListUnitsText];

    fn name(self) -> &'static str {
        match self {
            Self::BusQuery => "bus query",
            Self::ListUnitsText => "systemctl list-units",
        }
    }

    fn invocation(self) -> Invocation {
        match self {
            Self::BusQuery => Invocation::new(
                "busctl",
                [
                    "--system",
                    "--json=short",
                    "call",
                    "org.freedesktop.systemd1",
                    "/org/freedesktop/systemd1",
                    "org.freedesktop.systemd1.Manager",
                    "ListUnits",
                ],
            ),
            Self::ListUnitsText => Invocation::new(
                "systemctl",
                ["list-units", "--type=service", "--state=running", "--no-pager"],
            )
            .privileged(),
        }
    }

    fn parse(self, stdout: &str) -> Result<Vec<ServiceEntry>> {
        match self {
            Self::BusQuery => parse_list_units_json(stdout),
            Self::ListUnitsText => Ok(parse_list_units_text(stdout)),
        }
    }
}

/// Walk `strategies` in order; the first one that succeeds wins. When all
/// fail, the last error is returned.
pub async fn list_services(
    runner: &dyn CommandRunner,
    strategies: &[ListStrategy],
) -> Result<Vec<ServiceEntry>> {
    let mut last_err = Error::External("no service listing strategy configured".to_string());
    for &strategy in strategies {
        let res = async {
            let stdout = run_checked(runner, &strategy.invocation()).await?;
            strategy.parse(&stdout)
        }
        .await;
        match res {
            Ok(services) => {
                debug!(strategy = strategy.name(), count = services.len(), "listed services");
                return Ok(services);
            }
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "service listing strategy failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Parse `busctl --json=short call ... ListUnits`.
///
/// The reply is `{"type":"a(ssssssouso)","data":[[[name, description, load,
/// active, sub, ...], ...]]}`. Keeps `.service` units whose active state is
/// `active`.
pub fn parse_list_units_json(stdout: &str) -> Result<Vec<ServiceEntry>> {
    let reply: Value = serde_json::from_str(stdout)?;
    let units = reply
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::External("unexpected ListUnits reply shape".to_string()))?;

    let mut services: Vec<ServiceEntry> = units
        .iter()
        .filter_map(|u| {
            let name = u.get(0)?.as_str()?;
            let active_state = u.get(3)?.as_str()?;
            let short = name.strip_suffix(UNIT_SUFFIX)?;
            (active_state == "active").then(|| ServiceEntry::active(short))
        })
        .collect();
    services.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(services)
}

/// Parse the human-readable `systemctl list-units` table.
///
/// Data rows mention `.service`; the `UNIT` header and legend lines are
/// skipped. A leading status glyph (`●`) is ignored.
pub fn parse_list_units_text(stdout: &str) -> Vec<ServiceEntry> {
    stdout
        .lines()
        .filter(|line| line.contains(UNIT_SUFFIX) && !line.trim_start().starts_with("UNIT"))
        .filter_map(|line| {
            line.split_whitespace()
                .find(|field| *field != "●" && *field != "*")
                .map(|field| field.strip_suffix(UNIT_SUFFIX).unwrap_or(field))
                .map(ServiceEntry::active)
        })
        .collect()
}
