//! Container engine via the `docker` CLI.

use chrono::{DateTime, NaiveDateTime};
use hostbot_core::{
    domain::ContainerId,
    host::{Container, LifecycleOp},
};
use serde::Deserialize;
use tracing::debug;

use crate::command::Invocation;

/// Layout of `CreatedAt` in `docker ps --format '{{json .}}'`, minus the
/// trailing zone abbreviation.
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Builds engine command lines against one daemon endpoint.
#[derive(Clone, Debug)]
pub struct DockerCli {
    host: String,
}

impl DockerCli {
    /// `socket` is either a filesystem path or a full `scheme://` endpoint.
    pub fn new(socket: &str) -> Self {
        let host = if socket.contains("://") {
            socket.to_string()
        } else {
            format!("unix://{socket}")
        };
        Self { host }
    }

    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec!["-H".to_string(), self.host.clone()];
        all.extend(args.into_iter().map(Into::into));
        Invocation::new("docker", all).privileged()
    }

    pub fn list(&self, filter: Option<&ContainerId>) -> Invocation {
        let mut args = vec!["ps".to_string(), "-a".to_string()];
        if let Some(id) = filter {
            args.push("--filter".to_string());
            args.push(format!("id={id}"));
        }
        args.push("--format".to_string());
        args.push("{{json .}}".to_string());
        self.invocation(args)
    }

    pub fn lifecycle(&self, op: LifecycleOp, id: &ContainerId) -> Invocation {
        self.invocation([op.as_str(), id.as_str()])
    }

    pub fn logs(&self, id: &ContainerId, tail: u32) -> Invocation {
        self.invocation([
            "logs".to_string(),
            "--tail".to_string(),
            tail.to_string(),
            id.to_string(),
        ])
    }

    /// Availability probe.
    pub fn info(&self) -> Invocation {
        self.invocation(["info", "--format", "{{.ServerVersion}}"])
    }
}

#[derive(Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "CreatedAt")]
    created_at: String,
}

/// Parse `docker ps --format '{{json .}}'` output, one object per line.
///
/// Lines that are not valid JSON or lack one of the required fields are
/// skipped. An unparsable creation time becomes the Unix epoch.
pub fn parse_containers_output(output: &str) -> Vec<Container> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<PsLine>(line) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "skipping unparsable docker ps line");
                None
            }
        })
        .map(|ps| Container {
            id: ContainerId::new(&ps.id),
            name: ps.names,
            status: ps.status,
            image: ps.image,
            created: parse_created_at(&ps.created_at),
        })
        .collect()
}

/// `UTC`, `MSK`, or a numeric stand-in like `+04` for zones without a name.
fn is_zone_abbreviation(token: &str) -> bool {
    match token.strip_prefix(['+', '-']) {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic()),
    }
}

/// `2024-01-15 10:30:00 +0000 UTC` -> wall-clock time as printed.
fn parse_created_at(raw: &str) -> NaiveDateTime {
    let raw = raw.trim();
    let parse = |s: &str| DateTime::parse_from_str(s, CREATED_AT_FORMAT).ok();
    parse(raw)
        .or_else(|| {
            let (head, zone) = raw.rsplit_once(' ')?;
            is_zone_abbreviation(zone).then(|| parse(head)).flatten()
        })
        .map(|dt| dt.naive_local())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS_OUTPUT: &str = r#"{"Command":"\"/docker-entrypoint.…\"","CreatedAt":"2024-01-15 10:30:00 +0300 MSK","ID":"3f4e8a9b2c1d5e6f7a8b9c0d","Image":"nginx:1.25","Labels":"","LocalVolumes":"0","Mounts":"","Names":"web","Networks":"bridge","Ports":"0.0.0.0:80->80/tcp","RunningFor":"2 days ago","Size":"0B","State":"running","Status":"Up 2 days"}
{"ID":"aaaaaaaaaaaa","Names":"broken","Status":"Exited (0)","Image":"alpine"}
not json at all
"#;

    #[test]
    fn skips_lines_missing_required_fields() {
        let containers = parse_containers_output(PS_OUTPUT);
        assert_eq!(containers.len(), 1);

        let web = &containers[0];
        assert_eq!(web.id.as_str(), "3f4e8a9b2c1d");
        assert_eq!(web.name, "web");
        assert_eq!(web.status, "Up 2 days");
        assert_eq!(web.image, "nginx:1.25");
        assert_eq!(
            web.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-01-15 10:30:00"
        );
    }

    #[test]
    fn bad_timestamp_becomes_epoch() {
        let line = r#"{"ID":"0123456789abcdef","Names":"db","Status":"Up","Image":"postgres","CreatedAt":"yesterday"}"#;
        let containers = parse_containers_output(line);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].created, NaiveDateTime::default());
    }

    #[test]
    fn numeric_zone_abbreviation_is_accepted() {
        let line = r#"{"ID":"0123456789abcdef","Names":"db","Status":"Up","Image":"postgres","CreatedAt":"2024-01-15 10:30:00 +0400 +04"}"#;
        let containers = parse_containers_output(line);
        assert_eq!(
            containers[0].created.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-01-15 10:30:00"
        );

        let west = parse_created_at("2024-01-15 10:30:00 -0300 -03");
        assert_eq!(west.format("%H:%M").to_string(), "10:30");

        let bare_offset = parse_created_at("2024-01-15 10:30:00 +0000");
        assert_eq!(bare_offset.format("%H:%M").to_string(), "10:30");
    }

    #[test]
    fn empty_output_is_empty_list() {
        assert!(parse_containers_output("").is_empty());
        assert!(parse_containers_output("\n\n").is_empty());
    }

    #[test]
    fn command_lines_target_the_configured_socket() {
        let cli = DockerCli::new("/var/run/docker.sock");
        let id = ContainerId::new("0123456789ab");

        assert_eq!(
            cli.list(Some(&id)).to_string(),
            "docker -H unix:///var/run/docker.sock ps -a --filter id=0123456789ab --format {{json .}}"
        );
        assert_eq!(
            cli.lifecycle(LifecycleOp::Restart, &id).to_string(),
            "docker -H unix:///var/run/docker.sock restart 0123456789ab"
        );
        assert_eq!(
            cli.logs(&id, 100).to_string(),
            "docker -H unix:///var/run/docker.sock logs --tail 100 0123456789ab"
        );
        assert!(cli.list(None).privileged);
    }

    #[test]
    fn tcp_endpoints_are_kept_verbatim() {
        let cli = DockerCli::new("tcp://10.0.0.5:2375");
        assert!(cli.info().to_string().starts_with("docker -H tcp://10.0.0.5:2375 info"));
    }
}
