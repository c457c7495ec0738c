//! Menus, keyboards and report text.
//!
//! Pure rendering: every function turns already-fetched data into a [`Reply`].
//! Buttons are built from [`Callback`] values so the labels and the token
//! grammar cannot drift apart.

use crate::{
    callback::{Callback, ContainerAction, PowerOp, ServiceAction, View},
    domain::{ContainerId, ResourceRef},
    formatting::{escape_html, pre_block, truncate_output},
    host::{Container, LifecycleOp, ServiceEntry},
    messaging::types::{InlineButton, InlineKeyboard},
    telemetry::{CpuSnapshot, DiskSnapshot, MemorySnapshot},
    Result,
};

/// Service-status output is capped at this many characters.
pub const SERVICE_STATUS_LIMIT: usize = 1000;
/// Update listings are capped at this many characters.
pub const UPDATE_LISTING_LIMIT: usize = 2000;
/// Only the first services get a button.
pub const MAX_SERVICE_BUTTONS: usize = 30;
/// Telegram rejects a keyboard whose callback data exceeds this many bytes.
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub html: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl Reply {
    pub fn text(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(html: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            html: html.into(),
            keyboard: Some(keyboard),
        }
    }
}

fn button(label: &str, cb: Callback) -> InlineButton {
    InlineButton::new(label, cb.to_data())
}

fn fits_callback_data(cb: &Callback) -> bool {
    cb.to_data().len() <= MAX_CALLBACK_DATA_BYTES
}

fn back_to_main(label: &str) -> InlineButton {
    button(label, Callback::View(View::MainMenu))
}

/// Single "Back" button leading to the main menu.
pub fn back_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row([back_to_main("⬅️ Back")])
}

// ============== Menus ==============

pub fn main_menu() -> Reply {
    let kb = InlineKeyboard::one_per_row([
        button("📊 System status", Callback::View(View::Status)),
        button("🐳 Containers", Callback::View(View::Containers)),
        button("⚙️ Services", Callback::View(View::Services)),
        button("🖥 Server management", Callback::View(View::ServerManagement)),
    ]);
    Reply::with_keyboard("🤖 <b>Server Bot</b>\n\nChoose an action:", kb)
}

pub fn server_management_menu() -> Reply {
    let kb = InlineKeyboard::one_per_row([
        button(
            "🔄 Reboot server",
            Callback::View(View::ConfirmPower(PowerOp::Reboot)),
        ),
        button(
            "🔌 Shut down server",
            Callback::View(View::ConfirmPower(PowerOp::Shutdown)),
        ),
        button("🔍 Check for updates", Callback::CheckUpdates),
        button("⬆️ Upgrade system", Callback::UpgradeSystem),
        back_to_main("⬅️ Back"),
    ]);
    Reply::with_keyboard("🖥 <b>Server management</b>\n\nChoose an action:", kb)
}

pub fn power_confirmation(op: PowerOp) -> Reply {
    let (question, yes) = match op {
        PowerOp::Reboot => ("reboot", "✅ Yes, reboot"),
        PowerOp::Shutdown => ("shut down", "✅ Yes, shut down"),
    };
    let kb = InlineKeyboard::one_per_row([
        button(yes, Callback::Confirm(op)),
        back_to_main("❌ Cancel"),
    ]);
    Reply::with_keyboard(
        format!("⚠️ Are you sure you want to {question} the server?"),
        kb,
    )
}

pub fn unknown_command() -> Reply {
    Reply::text("❓ Unknown command. Use /start to see the available commands.")
}

// ============== Telemetry ==============

fn unavailable(err: &crate::Error) -> String {
    format!("unavailable: {}", escape_html(&err.to_string()))
}

pub fn cpu_text(cpu: &Result<CpuSnapshot>) -> String {
    match cpu {
        Ok(c) => format!(
            "Model: {}\nCores: {}\nFrequency: {:.2} MHz\nLoad: {:.2}%",
            escape_html(&c.model),
            c.cores,
            c.frequency_mhz,
            c.load_percent
        ),
        Err(e) => unavailable(e),
    }
}

pub fn memory_text(mem: &Result<MemorySnapshot>) -> String {
    match mem {
        Ok(m) => format!(
            "Total: {:.2} GB\nUsed: {:.2} GB\nFree: {:.2} GB\nLoad: {:.2}%\n\nSwap: {:.2} GB / {:.2} GB ({:.2}%)",
            m.total_gb,
            m.used_gb,
            m.free_gb,
            m.used_percent,
            m.swap_used_gb,
            m.swap_total_gb,
            m.swap_percent
        ),
        Err(e) => unavailable(e),
    }
}

pub fn disks_text(disks: &Result<Vec<DiskSnapshot>>) -> String {
    match disks {
        Ok(list) => list
            .iter()
            .map(|d| {
                format!(
                    "{} ({}):\n  Total: {:.2} GB\n  Used: {:.2} GB\n  Free: {:.2} GB\n  Load: {:.2}%",
                    escape_html(&d.mount_point),
                    escape_html(&d.file_system),
                    d.total_gb,
                    d.used_gb,
                    d.free_gb,
                    d.used_percent
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        Err(e) => unavailable(e),
    }
}

pub fn status_report(
    cpu: &Result<CpuSnapshot>,
    mem: &Result<MemorySnapshot>,
    disks: &Result<Vec<DiskSnapshot>>,
) -> Reply {
    Reply::with_keyboard(
        format!(
            "📊 <b>System status</b>\n\n💻 CPU:\n{}\n\n🧠 RAM:\n{}\n\n💾 HDD:\n{}",
            cpu_text(cpu),
            memory_text(mem),
            disks_text(disks)
        ),
        back_keyboard(),
    )
}

pub fn cpu_report(cpu: &Result<CpuSnapshot>) -> Reply {
    Reply::with_keyboard(
        format!("💻 <b>CPU status</b>\n\n{}", cpu_text(cpu)),
        back_keyboard(),
    )
}

pub fn memory_report(mem: &Result<MemorySnapshot>) -> Reply {
    Reply::with_keyboard(
        format!("🧠 <b>Memory status</b>\n\n{}", memory_text(mem)),
        back_keyboard(),
    )
}

pub fn disks_report(disks: &Result<Vec<DiskSnapshot>>) -> Reply {
    Reply::with_keyboard(
        format!("💾 <b>Disk status</b>\n\n{}", disks_text(disks)),
        back_keyboard(),
    )
}

// ============== Containers ==============

pub fn container_list(containers: &Result<Vec<Container>>) -> Reply {
    let containers = match containers {
        Ok(v) => v,
        Err(e) => {
            return Reply::text(format!(
                "❌ Failed to list containers: {}",
                escape_html(&e.to_string())
            ))
        }
    };
    if containers.is_empty() {
        return Reply::text("📭 No containers found");
    }

    let mut buttons: Vec<InlineButton> = containers
        .iter()
        .map(|c| {
            button(
                &format!("{} [{}]", c.name, c.status),
                Callback::ResourceMenu(ResourceRef::Container(c.id.clone())),
            )
        })
        .collect();
    buttons.push(back_to_main("⬅️ Back"));

    Reply::with_keyboard(
        "Choose a container to manage:",
        InlineKeyboard::one_per_row(buttons),
    )
}

pub fn container_menu(id: &ContainerId) -> Reply {
    let act = |label: &str, action| button(label, Callback::Container(action, id.clone()));
    let kb = InlineKeyboard::new(vec![
        vec![
            act("🔄 Restart", ContainerAction::Restart),
            act("🟥 Stop", ContainerAction::Stop),
        ],
        vec![
            act("🟩 Start", ContainerAction::Start),
            act("📊 Status", ContainerAction::Status),
        ],
        vec![
            act("📝 Logs", ContainerAction::Logs),
            button("⬅️ Back", Callback::BackToContainers),
        ],
    ]);
    Reply::with_keyboard(
        format!(
            "Choose an action for container <code>{}</code>:",
            escape_html(id.as_str())
        ),
        kb,
    )
}

pub fn container_lifecycle_outcome(op: LifecycleOp, id: &ContainerId, res: &Result<()>) -> Reply {
    let id = escape_html(id.as_str());
    match res {
        Ok(()) => Reply::text(format!("✅ Container <code>{id}</code> {}", past_tense(op))),
        Err(e) => Reply::text(format!(
            "❌ Failed to {} container <code>{id}</code>: {}",
            op.as_str(),
            escape_html(&e.to_string())
        )),
    }
}

pub fn container_status(id: &ContainerId, found: &Result<Container>) -> Reply {
    match found {
        Ok(c) => {
            let body = format!(
                "ID: {}\nName: {}\nStatus: {}\nImage: {}\nCreated: {}",
                c.id,
                c.name,
                c.status,
                c.image,
                c.created.format("%Y-%m-%d %H:%M:%S")
            );
            Reply::text(format!(
                "Status of container <b>{}</b>:\n{}",
                escape_html(id.as_str()),
                pre_block(&body)
            ))
        }
        Err(e) => Reply::text(format!(
            "❌ Failed to get container status: {}",
            escape_html(&e.to_string())
        )),
    }
}

pub fn container_logs_header(id: &ContainerId) -> String {
    format!("📝 <b>Logs of {}</b>\n", escape_html(id.as_str()))
}

pub fn container_logs_failed(id: &ContainerId, err: &crate::Error) -> Reply {
    Reply::text(format!(
        "❌ Failed to get logs of container <code>{}</code>: {}",
        escape_html(id.as_str()),
        escape_html(&err.to_string())
    ))
}

// ============== Services ==============

pub fn service_list(services: &Result<Vec<ServiceEntry>>) -> Reply {
    let services = match services {
        Ok(v) => v,
        Err(e) => {
            return Reply::text(format!(
                "❌ Failed to list services: {}",
                escape_html(&e.to_string())
            ))
        }
    };

    // A name must fit in every token of its own menu, not just `service:<name>`.
    let mut buttons: Vec<InlineButton> = services
        .iter()
        .filter(|s| {
            fits_callback_data(&Callback::Service(
                ServiceAction::Restart,
                s.name.clone(),
            ))
        })
        .take(MAX_SERVICE_BUTTONS)
        .map(|s| {
            button(
                &s.label(),
                Callback::ResourceMenu(ResourceRef::Service(s.name.clone())),
            )
        })
        .collect();
    buttons.push(back_to_main("⬅️ Back"));

    Reply::with_keyboard(
        "⚙️ <b>System services</b>\n\n🟩 active\n🟥 inactive\n\nChoose a service to manage:",
        InlineKeyboard::one_per_row(buttons),
    )
}

pub fn service_menu(name: &str) -> Reply {
    let act = |label: &str, action| button(label, Callback::Service(action, name.to_string()));
    let kb = InlineKeyboard::new(vec![
        vec![
            act("🔄 Restart", ServiceAction::Restart),
            act("🟥 Stop", ServiceAction::Stop),
        ],
        vec![
            act("🟩 Start", ServiceAction::Start),
            act("📊 Status", ServiceAction::Status),
        ],
        vec![button("⬅️ Back", Callback::View(View::Services))],
    ]);
    Reply::with_keyboard(
        format!("Choose an action for service <b>{}</b>:", escape_html(name)),
        kb,
    )
}

pub fn service_lifecycle_outcome(op: LifecycleOp, name: &str, res: &Result<()>) -> Reply {
    let name = escape_html(name);
    match res {
        Ok(()) => Reply::text(format!("✅ Service {name} {}", past_tense(op))),
        Err(e) => Reply::text(format!(
            "❌ Failed to {} service {name}: {}",
            op.as_str(),
            escape_html(&e.to_string())
        )),
    }
}

pub fn service_status(name: &str, res: &Result<String>) -> Reply {
    match res {
        Ok(out) => Reply::text(format!(
            "Status of service <b>{}</b>:\n{}",
            escape_html(name),
            pre_block(&truncate_output(out, SERVICE_STATUS_LIMIT))
        )),
        Err(e) => Reply::text(format!(
            "❌ Failed to get status of service {}: {}",
            escape_html(name),
            escape_html(&e.to_string())
        )),
    }
}

fn past_tense(op: LifecycleOp) -> &'static str {
    match op {
        LifecycleOp::Start => "started",
        LifecycleOp::Stop => "stopped",
        LifecycleOp::Restart => "restarted",
    }
}

// ============== Power / packages ==============

pub fn power_outcome(op: PowerOp, res: &Result<()>) -> Reply {
    match (op, res) {
        (PowerOp::Reboot, Ok(())) => Reply::text("🔄 Server is rebooting..."),
        (PowerOp::Shutdown, Ok(())) => Reply::text("🔌 Server is shutting down..."),
        (PowerOp::Reboot, Err(e)) => Reply::text(format!(
            "❌ Failed to reboot the server: {}",
            escape_html(&e.to_string())
        )),
        (PowerOp::Shutdown, Err(e)) => Reply::text(format!(
            "❌ Failed to shut down the server: {}",
            escape_html(&e.to_string())
        )),
    }
}

pub fn checking_updates() -> Reply {
    Reply::text("🔍 Checking for available updates...")
}

pub fn updates_failed(err: &crate::Error) -> Reply {
    Reply::text(format!(
        "❌ Failed to check for updates: {}",
        escape_html(&err.to_string())
    ))
}

pub fn all_up_to_date() -> Reply {
    Reply::text("✅ All packages are up to date!")
}

pub fn update_listing(listing: &str) -> Reply {
    Reply::text(format!(
        "🔍 <b>Available updates:</b>\n{}",
        pre_block(&truncate_output(listing, UPDATE_LISTING_LIMIT))
    ))
}

pub fn upgrade_started() -> Reply {
    Reply::text("⬆️ Starting system upgrade...")
}

pub fn upgrade_outcome(res: &Result<()>) -> Reply {
    match res {
        Ok(()) => Reply::text("✅ System upgraded successfully!"),
        Err(e) => Reply::text(format!(
            "❌ System upgrade failed: {}",
            escape_html(&e.to_string())
        )),
    }
}
