//! Callback-token grammar.
//!
//! Tokens travel inside inline keyboard buttons and come back verbatim when a
//! button is pressed. They are the only navigation state the bot has: every
//! "where am I" detail is encoded in the token, nothing is kept per chat.
//!
//! Wire format: `verb` or `verb:argument`. Parsing splits on the first `:` and
//! matches the verb exactly, so no verb can shadow another by prefix.

use std::fmt;

use crate::domain::{ContainerId, ResourceRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerAction {
    Restart,
    Stop,
    Start,
    Status,
    Logs,
}

impl ContainerAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Status => "status",
            Self::Logs => "logs",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceAction {
    Restart,
    Stop,
    Start,
    Status,
}

impl ServiceAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Restart => "restart_service",
            Self::Stop => "stop_service",
            Self::Start => "start_service",
            Self::Status => "status_service",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerOp {
    Reboot,
    Shutdown,
}

/// Views reachable from a bare verb. Each mirrors a slash command or a sub-menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    MainMenu,
    Status,
    Containers,
    Services,
    ServerManagement,
    ConfirmPower(PowerOp),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callback {
    /// `container:<id>` / `service:<name>`: per-resource action menu.
    ResourceMenu(ResourceRef),
    /// `back`: container list again.
    BackToContainers,
    Container(ContainerAction, ContainerId),
    Service(ServiceAction, String),
    View(View),
    /// `confirm_reboot` / `confirm_shutdown`.
    Confirm(PowerOp),
    CheckUpdates,
    UpgradeSystem,
}

impl Callback {
    /// Parse a raw token. `None` means "unrecognized" and must be ignored silently.
    pub fn parse(data: &str) -> Option<Self> {
        match data.split_once(':') {
            None => Self::parse_bare(data),
            Some((verb, arg)) => {
                if arg.is_empty() {
                    return None;
                }
                Self::parse_with_arg(verb, arg)
            }
        }
    }

    fn parse_bare(verb: &str) -> Option<Self> {
        let cb = match verb {
            "status" => Self::View(View::Status),
            "containers" => Self::View(View::Containers),
            "services" => Self::View(View::Services),
            "server_management" => Self::View(View::ServerManagement),
            "reboot" => Self::View(View::ConfirmPower(PowerOp::Reboot)),
            "shutdown" => Self::View(View::ConfirmPower(PowerOp::Shutdown)),
            "back_to_main" => Self::View(View::MainMenu),
            "back" => Self::BackToContainers,
            "confirm_reboot" => Self::Confirm(PowerOp::Reboot),
            "confirm_shutdown" => Self::Confirm(PowerOp::Shutdown),
            "check_updates" => Self::CheckUpdates,
            "upgrade_system" => Self::UpgradeSystem,
            _ => return None,
        };
        Some(cb)
    }

    fn parse_with_arg(verb: &str, arg: &str) -> Option<Self> {
        let container = |action| Self::Container(action, ContainerId::new(arg));
        let service = |action| Self::Service(action, arg.to_string());

        let cb = match verb {
            "container" => Self::ResourceMenu(ResourceRef::Container(ContainerId::new(arg))),
            "service" => Self::ResourceMenu(ResourceRef::Service(arg.to_string())),
            "restart" => container(ContainerAction::Restart),
            "stop" => container(ContainerAction::Stop),
            "start" => container(ContainerAction::Start),
            "status" => container(ContainerAction::Status),
            "logs" => container(ContainerAction::Logs),
            "restart_service" => service(ServiceAction::Restart),
            "stop_service" => service(ServiceAction::Stop),
            "start_service" => service(ServiceAction::Start),
            "status_service" => service(ServiceAction::Status),
            _ => return None,
        };
        Some(cb)
    }

    /// Encode back into the wire token.
    pub fn to_data(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceMenu(ResourceRef::Container(id)) => write!(f, "container:{id}"),
            Self::ResourceMenu(ResourceRef::Service(name)) => write!(f, "service:{name}"),
            Self::BackToContainers => f.write_str("back"),
            Self::Container(action, id) => write!(f, "{}:{id}", action.verb()),
            Self::Service(action, name) => write!(f, "{}:{name}", action.verb()),
            Self::View(view) => f.write_str(match view {
                View::MainMenu => "back_to_main",
                View::Status => "status",
                View::Containers => "containers",
                View::Services => "services",
                View::ServerManagement => "server_management",
                View::ConfirmPower(PowerOp::Reboot) => "reboot",
                View::ConfirmPower(PowerOp::Shutdown) => "shutdown",
            }),
            Self::Confirm(PowerOp::Reboot) => f.write_str("confirm_reboot"),
            Self::Confirm(PowerOp::Shutdown) => f.write_str("confirm_shutdown"),
            Self::CheckUpdates => f.write_str("check_updates"),
            Self::UpgradeSystem => f.write_str("upgrade_system"),
        }
    }
}
