use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use hostbot_core::{
    callback::PowerOp,
    dispatcher::Dispatcher,
    domain::{ChatId, ContainerId, MessageId, MessageRef},
    formatting::TRUNCATION_MARKER,
    host::{Container, HostControl, LifecycleOp, ServiceEntry},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, CommandMessage, InboundEvent, InlineKeyboard, MessagingCapabilities},
    },
    security::AllowList,
    telemetry::{CpuSnapshot, DiskSnapshot, MemorySnapshot, TelemetrySource},
    Error, Result,
};

const ALLOWED: ChatId = ChatId(1001);
const STRANGER: ChatId = ChatId(666);

#[derive(Clone, Debug, PartialEq)]
enum Sent {
    Html(ChatId, String),
    Keyboard(ChatId, String, InlineKeyboard),
    Edit(MessageRef, String, Option<InlineKeyboard>),
    Ack(String),
}

/// Port calls across all fakes, in the order they happened.
type Timeline = Arc<Mutex<Vec<String>>>;

struct FakeMessenger {
    log: Mutex<Vec<Sent>>,
    timeline: Timeline,
    max_message_len: usize,
}

impl FakeMessenger {
    fn new(timeline: Timeline) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            timeline,
            max_message_len: 4096,
        }
    }

    fn push(&self, sent: Sent) {
        let label = match &sent {
            Sent::Ack(_) => "ack",
            _ => "reply",
        };
        self.timeline.lock().unwrap().push(label.to_string());
        self.log.lock().unwrap().push(sent);
    }

    fn log(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Html(_, t) | Sent::Keyboard(_, t, _) | Sent::Edit(_, t, _) => Some(t),
                Sent::Ack(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_edit: true,
            max_message_len: self.max_message_len,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.push(Sent::Html(chat_id, html.to_string()));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(1),
        })
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.push(Sent::Keyboard(chat_id, html.to_string(), keyboard));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(2),
        })
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.push(Sent::Edit(msg, html.to_string(), None));
        Ok(())
    }

    async fn edit_inline_keyboard(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()> {
        self.push(Sent::Edit(msg, html.to_string(), Some(keyboard)));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        self.push(Sent::Ack(callback_id.to_string()));
        Ok(())
    }
}

struct FakeTelemetry {
    calls: Mutex<Vec<&'static str>>,
    timeline: Timeline,
}

impl FakeTelemetry {
    fn new(timeline: Timeline) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            timeline,
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.timeline.lock().unwrap().push(call.to_string());
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TelemetrySource for FakeTelemetry {
    async fn cpu_snapshot(&self) -> Result<CpuSnapshot> {
        self.record("cpu");
        Ok(CpuSnapshot {
            model: "Test CPU".to_string(),
            cores: 4,
            frequency_mhz: 3000.0,
            load_percent: 42.5,
        })
    }

    async fn memory_snapshot(&self) -> Result<MemorySnapshot> {
        self.record("memory");
        Err(Error::Telemetry("meminfo unreadable".to_string()))
    }

    async fn disk_snapshots(&self) -> Result<Vec<DiskSnapshot>> {
        self.record("disk");
        Ok(vec![DiskSnapshot {
            mount_point: "/".to_string(),
            file_system: "ext4".to_string(),
            total_gb: 100.0,
            used_gb: 40.0,
            free_gb: 60.0,
            used_percent: 40.0,
        }])
    }
}

struct FakeHost {
    calls: Mutex<Vec<String>>,
    timeline: Timeline,
    power_error: Option<String>,
    upgrade_error: Option<String>,
    upgradable: String,
    containers: Vec<Container>,
    services: Vec<ServiceEntry>,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            timeline: Timeline::default(),
            power_error: None,
            upgrade_error: None,
            upgradable: "Listing... Done\n".to_string(),
            containers: Vec::new(),
            services: Vec::new(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        let call = call.into();
        self.timeline.lock().unwrap().push(call.clone());
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl HostControl for FakeHost {
    async fn list_containers(&self, filter: Option<&ContainerId>) -> Result<Vec<Container>> {
        self.record(format!("list_containers:{}", filter.map(|f| f.as_str()).unwrap_or("*")));
        Ok(self
            .containers
            .iter()
            .filter(|c| filter.map_or(true, |f| &c.id == f))
            .cloned()
            .collect())
    }

    async fn container_lifecycle(&self, op: LifecycleOp, id: &ContainerId) -> Result<()> {
        self.record(format!("{}:{id}", op.as_str()));
        Ok(())
    }

    async fn container_logs(&self, id: &ContainerId) -> Result<String> {
        self.record(format!("logs:{id}"));
        Ok("line one\nline <two>\n".to_string())
    }

    async fn list_services(&self) -> Result<Vec<ServiceEntry>> {
        self.record("list_services");
        Ok(self.services.clone())
    }

    async fn service_lifecycle(&self, op: LifecycleOp, name: &str) -> Result<()> {
        self.record(format!("{}_service:{name}", op.as_str()));
        Ok(())
    }

    async fn service_status(&self, name: &str) -> Result<String> {
        self.record(format!("status_service:{name}"));
        Ok("● nginx.service - A high performance web server".to_string())
    }

    async fn power(&self, op: PowerOp) -> Result<()> {
        self.record(format!("power:{op:?}"));
        match &self.power_error {
            Some(detail) => Err(Error::command("shutdown", detail.clone())),
            None => Ok(()),
        }
    }

    async fn check_updates(&self) -> Result<String> {
        self.record("check_updates");
        Ok(self.upgradable.clone())
    }

    async fn upgrade_system(&self) -> Result<()> {
        self.record("upgrade_system");
        match &self.upgrade_error {
            Some(detail) => Err(Error::command("apt", detail.clone())),
            None => Ok(()),
        }
    }
}

struct Harness {
    dispatcher: Dispatcher,
    messenger: Arc<FakeMessenger>,
    telemetry: Arc<FakeTelemetry>,
    host: Arc<FakeHost>,
    timeline: Timeline,
}

fn harness(mut host: FakeHost) -> Harness {
    let timeline = Timeline::default();
    let messenger = Arc::new(FakeMessenger::new(timeline.clone()));
    let telemetry = Arc::new(FakeTelemetry::new(timeline.clone()));
    host.timeline = timeline.clone();
    let host = Arc::new(host);
    let dispatcher = Dispatcher::new(
        AllowList::new([ALLOWED.0]),
        telemetry.clone(),
        host.clone(),
        messenger.clone(),
    );
    Harness {
        dispatcher,
        messenger,
        telemetry,
        host,
        timeline,
    }
}

fn command(chat: ChatId, text: &str) -> InboundEvent {
    InboundEvent::Command(CommandMessage {
        chat_id: chat,
        text: text.to_string(),
    })
}

fn callback(chat: ChatId, data: &str) -> InboundEvent {
    InboundEvent::Callback(CallbackQuery {
        chat_id: chat,
        callback_id: "cb-1".to_string(),
        data: data.to_string(),
        message: Some(MessageRef {
            chat_id: chat,
            message_id: MessageId(77),
        }),
    })
}

fn container(id: &str, name: &str) -> Container {
    Container {
        id: ContainerId::new(id),
        name: name.to_string(),
        status: "Up 3 hours".to_string(),
        image: "nginx:1.25".to_string(),
        created: NaiveDateTime::default(),
    }
}

#[tokio::test]
async fn unauthorized_chat_triggers_no_calls_at_all() {
    let h = harness(FakeHost::new());

    for event in [
        command(STRANGER, "/status"),
        command(STRANGER, "/reboot"),
        callback(STRANGER, "confirm_shutdown"),
        callback(STRANGER, "check_updates"),
    ] {
        h.dispatcher.handle(event).await;
    }

    assert!(h.messenger.log().is_empty());
    assert!(h.telemetry.calls().is_empty());
    assert!(h.host.calls().is_empty());
}

#[tokio::test]
async fn cpu_command_replies_with_load_and_back_button() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(command(ALLOWED, "/cpu")).await;

    assert_eq!(h.telemetry.calls(), vec!["cpu"]);
    let log = h.messenger.log();
    assert_eq!(log.len(), 1);
    let Sent::Keyboard(chat, text, kb) = &log[0] else {
        panic!("expected keyboard reply, got {log:?}");
    };
    assert_eq!(*chat, ALLOWED);
    assert!(text.contains("42.5"));
    let buttons: Vec<_> = kb.buttons().collect();
    assert_eq!(buttons.len(), 1);
    assert_eq!(buttons[0].callback_data, "back_to_main");
}

#[tokio::test]
async fn status_report_survives_a_failing_metric() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(command(ALLOWED, "/status")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("42.50%"));
    assert!(texts[0].contains("unavailable: telemetry error: meminfo unreadable"));
    assert!(texts[0].contains("40.00%"));
}

#[tokio::test]
async fn unknown_command_gets_usage_hint() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(command(ALLOWED, "/CPU")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("/start"));
    assert!(h.telemetry.calls().is_empty());
}

#[tokio::test]
async fn power_commands_only_ask_for_confirmation() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(command(ALLOWED, "/shutdown")).await;

    assert!(h.host.calls().is_empty());
    let log = h.messenger.log();
    let Sent::Keyboard(_, _, kb) = &log[0] else {
        panic!("expected confirmation keyboard, got {log:?}");
    };
    let data: Vec<_> = kb.buttons().map(|b| b.callback_data.as_str()).collect();
    assert_eq!(data, vec!["confirm_shutdown", "back_to_main"]);
}

#[tokio::test]
async fn confirmed_shutdown_runs_and_reports() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "confirm_shutdown")).await;

    assert_eq!(h.host.calls(), vec!["power:Shutdown"]);
    let log = h.messenger.log();
    assert_eq!(log[0], Sent::Ack("cb-1".to_string()));
    assert_eq!(
        log[1],
        Sent::Html(ALLOWED, "🔌 Server is shutting down...".to_string())
    );
}

#[tokio::test]
async fn failed_shutdown_reports_the_underlying_error() {
    let mut host = FakeHost::new();
    host.power_error = Some("permission denied".to_string());
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "confirm_shutdown")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("permission denied"));
}

#[tokio::test]
async fn check_updates_with_nothing_pending_returns_to_main_menu() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "check_updates")).await;

    let log = h.messenger.log();
    assert_eq!(log.len(), 4, "{log:?}");
    assert_eq!(log[0], Sent::Ack("cb-1".to_string()));
    assert!(matches!(&log[1], Sent::Html(_, t) if t.contains("Checking")));
    assert!(matches!(&log[2], Sent::Html(_, t) if t.contains("up to date")));
    let Sent::Keyboard(_, _, kb) = &log[3] else {
        panic!("expected main menu, got {:?}", log[3]);
    };
    assert!(kb.buttons().any(|b| b.callback_data == "server_management"));
}

#[tokio::test]
async fn check_updates_lists_pending_packages() {
    let mut host = FakeHost::new();
    host.upgradable =
        "Listing... Done\ncurl/jammy-updates 7.81.0-1ubuntu1.16 amd64 [upgradable from: 7.81.0-1ubuntu1.15]\n"
            .to_string();
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "check_updates")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("curl/jammy-updates"));
    assert!(texts[1].contains("<pre>"));
}

#[tokio::test]
async fn unknown_callback_is_acknowledged_and_otherwise_ignored() {
    let h = harness(FakeHost::new());

    for data in ["", "bogus", "restart:", "check_updates:now", "restartx:abc"] {
        h.dispatcher.handle(callback(ALLOWED, data)).await;
    }

    let log = h.messenger.log();
    assert_eq!(log.len(), 5);
    assert!(log.iter().all(|s| matches!(s, Sent::Ack(_))));
    assert!(h.host.calls().is_empty());
}

#[tokio::test]
async fn container_flow_from_list_to_restart() {
    let mut host = FakeHost::new();
    host.containers = vec![container("0123456789abcdef", "web")];
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "containers")).await;
    let log = h.messenger.log();
    let Sent::Keyboard(_, _, kb) = &log[1] else {
        panic!("expected container list, got {log:?}");
    };
    let first = kb.buttons().next().map(|b| b.callback_data.clone());
    assert_eq!(first.as_deref(), Some("container:0123456789ab"));

    h.dispatcher.handle(callback(ALLOWED, "restart:0123456789ab")).await;

    assert_eq!(
        h.host.calls(),
        vec!["list_containers:*", "restart:0123456789ab"]
    );
    let texts = h.messenger.texts();
    assert!(texts
        .last()
        .is_some_and(|t| t.contains("restarted") && t.contains("0123456789ab")));
}

#[tokio::test]
async fn container_status_for_missing_container_reports_not_found() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "status:0123456789ab")).await;

    assert_eq!(h.host.calls(), vec!["list_containers:0123456789ab"]);
    let texts = h.messenger.texts();
    assert!(texts[0].contains("not found"));
}

#[tokio::test]
async fn container_logs_are_escaped_inside_pre() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "logs:0123456789ab")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("line &lt;two&gt;"));
    assert!(texts[0].contains("<pre>"));
}

#[tokio::test]
async fn services_view_edits_the_menu_message_in_place() {
    let mut host = FakeHost::new();
    host.services = vec![ServiceEntry::active("nginx"), ServiceEntry::active("ssh")];
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "services")).await;

    let log = h.messenger.log();
    assert_eq!(log.len(), 2);
    let Sent::Edit(msg, _, Some(kb)) = &log[1] else {
        panic!("expected in-place edit, got {log:?}");
    };
    assert_eq!(msg.message_id, MessageId(77));
    let data: Vec<_> = kb.buttons().map(|b| b.callback_data.as_str()).collect();
    assert_eq!(data, vec!["service:nginx", "service:ssh", "back_to_main"]);
}

#[tokio::test]
async fn service_restart_runs_lifecycle_op() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "restart_service:nginx")).await;

    assert_eq!(h.host.calls(), vec!["restart_service:nginx"]);
    assert!(h.messenger.texts()[0].contains("Service nginx restarted"));
}

const EVERY_CALLBACK: &[&str] = &[
    "status",
    "containers",
    "services",
    "server_management",
    "reboot",
    "shutdown",
    "back_to_main",
    "back",
    "confirm_reboot",
    "confirm_shutdown",
    "check_updates",
    "upgrade_system",
    "container:0123456789ab",
    "service:nginx",
    "restart:0123456789ab",
    "stop:0123456789ab",
    "start:0123456789ab",
    "status:0123456789ab",
    "logs:0123456789ab",
    "restart_service:nginx",
    "stop_service:nginx",
    "start_service:nginx",
    "status_service:nginx",
];

#[tokio::test]
async fn every_callback_is_acknowledged_before_anything_else() {
    for data in EVERY_CALLBACK {
        let mut host = FakeHost::new();
        host.containers = vec![container("0123456789ab", "web")];
        host.services = vec![ServiceEntry::active("nginx")];
        let h = harness(host);

        h.dispatcher.handle(callback(ALLOWED, data)).await;

        let log = h.messenger.log();
        assert_eq!(log[0], Sent::Ack("cb-1".to_string()), "{data}");
        assert!(log.len() > 1, "{data} produced no reply");
        assert_eq!(h.timeline.lock().unwrap()[0], "ack", "{data}");
    }
}

#[tokio::test]
async fn back_rerenders_the_container_list() {
    let mut host = FakeHost::new();
    host.containers = vec![container("0123456789ab", "web")];
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "back")).await;

    assert_eq!(h.host.calls(), vec!["list_containers:*"]);
    let log = h.messenger.log();
    assert_eq!(log.len(), 2);
    let Sent::Keyboard(chat, _, kb) = &log[1] else {
        panic!("expected container list, got {log:?}");
    };
    assert_eq!(*chat, ALLOWED);
    let data: Vec<_> = kb.buttons().map(|b| b.callback_data.as_str()).collect();
    assert_eq!(data, vec!["container:0123456789ab", "back_to_main"]);
}

#[tokio::test]
async fn container_menu_offers_every_action_without_host_calls() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "container:0123456789ab")).await;

    assert!(h.host.calls().is_empty());
    let log = h.messenger.log();
    let Sent::Keyboard(_, text, kb) = &log[1] else {
        panic!("expected container menu, got {log:?}");
    };
    assert!(text.contains("<code>0123456789ab</code>"));
    let data: Vec<_> = kb.buttons().map(|b| b.callback_data.as_str()).collect();
    assert_eq!(
        data,
        vec![
            "restart:0123456789ab",
            "stop:0123456789ab",
            "start:0123456789ab",
            "status:0123456789ab",
            "logs:0123456789ab",
            "back",
        ]
    );
}

#[tokio::test]
async fn service_menu_offers_every_action_without_host_calls() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "service:nginx")).await;

    assert!(h.host.calls().is_empty());
    let log = h.messenger.log();
    let Sent::Keyboard(_, text, kb) = &log[1] else {
        panic!("expected service menu, got {log:?}");
    };
    assert!(text.contains("<b>nginx</b>"));
    let data: Vec<_> = kb.buttons().map(|b| b.callback_data.as_str()).collect();
    assert_eq!(
        data,
        vec![
            "restart_service:nginx",
            "stop_service:nginx",
            "start_service:nginx",
            "status_service:nginx",
            "services",
        ]
    );
}

#[tokio::test]
async fn server_management_edits_the_menu_message_in_place() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "server_management")).await;

    assert!(h.host.calls().is_empty());
    let log = h.messenger.log();
    assert_eq!(log.len(), 2);
    let Sent::Edit(msg, text, Some(kb)) = &log[1] else {
        panic!("expected in-place edit, got {log:?}");
    };
    assert_eq!(msg.message_id, MessageId(77));
    assert!(text.contains("Server management"));
    let data: Vec<_> = kb.buttons().map(|b| b.callback_data.as_str()).collect();
    assert_eq!(
        data,
        vec![
            "reboot",
            "shutdown",
            "check_updates",
            "upgrade_system",
            "back_to_main",
        ]
    );
}

#[tokio::test]
async fn upgrade_reports_start_and_success_only() {
    let h = harness(FakeHost::new());

    h.dispatcher.handle(callback(ALLOWED, "upgrade_system")).await;

    assert_eq!(h.host.calls(), vec!["upgrade_system"]);
    assert_eq!(
        h.messenger.texts(),
        vec![
            "⬆️ Starting system upgrade...".to_string(),
            "✅ System upgraded successfully!".to_string(),
        ]
    );
}

#[tokio::test]
async fn failed_upgrade_reports_start_and_the_error_only() {
    let mut host = FakeHost::new();
    host.upgrade_error = Some("dpkg lock held".to_string());
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "upgrade_system")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 2, "{texts:?}");
    assert_eq!(texts[0], "⬆️ Starting system upgrade...");
    assert!(texts[1].starts_with("❌ System upgrade failed: "));
    assert!(texts[1].contains("dpkg lock held"));
    assert!(!texts.iter().any(|t| t.contains("<pre>")));
}

#[tokio::test]
async fn service_stop_start_and_status_reach_the_host() {
    let h = harness(FakeHost::new());

    for data in [
        "stop_service:nginx",
        "start_service:nginx",
        "status_service:nginx",
    ] {
        h.dispatcher.handle(callback(ALLOWED, data)).await;
    }

    assert_eq!(
        h.host.calls(),
        vec![
            "stop_service:nginx",
            "start_service:nginx",
            "status_service:nginx",
        ]
    );
    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], "✅ Service nginx stopped");
    assert_eq!(texts[1], "✅ Service nginx started");
    assert!(texts[2].starts_with("Status of service <b>nginx</b>:\n<pre>"));
    assert!(texts[2].contains("nginx.service - A high performance web server"));
}

#[tokio::test]
async fn long_update_listing_is_truncated() {
    let mut host = FakeHost::new();
    host.upgradable = std::iter::once("Listing... Done\n".to_string())
        .chain((0..100).map(|i| {
            format!("pkg{i:02}/jammy-updates 1.0.1 amd64 [upgradable from: 1.0.0]\n")
        }))
        .collect();
    assert!(host.upgradable.chars().count() > 2000);
    let h = harness(host);

    h.dispatcher.handle(callback(ALLOWED, "check_updates")).await;

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains(TRUNCATION_MARKER));
    assert!(texts[1].contains("pkg00/"));
    assert!(!texts[1].contains("pkg99/"));
    assert!(texts[1].chars().count() < 2200);
}
