//! Command / callback dispatch.
//!
//! The dispatcher is stateless: everything it needs to know about where the
//! user is in the menu tree comes from the callback token itself. Collaborators
//! are injected once at startup and only read afterwards.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    callback::{Callback, ContainerAction, PowerOp, ServiceAction, View},
    command::Command,
    domain::{ChatId, ContainerId, MessageRef, ResourceRef},
    errors::Error,
    formatting::split_pre_messages,
    host::{count_upgradable_packages, HostControl, LifecycleOp},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, CommandMessage, InboundEvent},
    },
    security::AllowList,
    telemetry::TelemetrySource,
    views::{self, Reply},
    Result,
};

pub struct Dispatcher {
    allow_list: AllowList,
    telemetry: Arc<dyn TelemetrySource>,
    host: Arc<dyn HostControl>,
    messenger: Arc<dyn MessagingPort>,
}

impl Dispatcher {
    pub fn new(
        allow_list: AllowList,
        telemetry: Arc<dyn TelemetrySource>,
        host: Arc<dyn HostControl>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            allow_list,
            telemetry,
            host,
            messenger,
        }
    }

    /// Entry point for every inbound event. Events from chats outside the
    /// allow-list are dropped without any reply or external call.
    pub async fn handle(&self, event: InboundEvent) {
        if !self.allow_list.is_authorized(event.chat_id()) {
            debug!(chat_id = event.chat_id().0, "dropping event from unauthorized chat");
            return;
        }

        match event {
            InboundEvent::Command(msg) => self.handle_command(msg).await,
            InboundEvent::Callback(q) => self.handle_callback(q).await,
        }
    }

    async fn handle_command(&self, msg: CommandMessage) {
        let chat = msg.chat_id;
        let Some(cmd) = Command::parse(&msg.text) else {
            self.send(chat, views::unknown_command()).await;
            return;
        };

        match cmd {
            Command::Start => self.show_view(chat, None, View::MainMenu).await,
            Command::Status => self.show_view(chat, None, View::Status).await,
            Command::Cpu => {
                let cpu = self.telemetry.cpu_snapshot().await;
                self.send(chat, views::cpu_report(&cpu)).await;
            }
            Command::Ram => {
                let mem = self.telemetry.memory_snapshot().await;
                self.send(chat, views::memory_report(&mem)).await;
            }
            Command::Hdd => {
                let disks = self.telemetry.disk_snapshots().await;
                self.send(chat, views::disks_report(&disks)).await;
            }
            Command::Containers => self.show_view(chat, None, View::Containers).await,
            Command::Reboot => {
                self.show_view(chat, None, View::ConfirmPower(PowerOp::Reboot))
                    .await
            }
            Command::Shutdown => {
                self.show_view(chat, None, View::ConfirmPower(PowerOp::Shutdown))
                    .await
            }
        }
    }

    async fn handle_callback(&self, q: CallbackQuery) {
        // Acknowledge first, whatever the token turns out to be.
        if let Err(e) = self.messenger.answer_callback_query(&q.callback_id).await {
            warn!(error = %e, "failed to answer callback query");
        }

        let Some(cb) = Callback::parse(&q.data) else {
            debug!(data = %q.data, "ignoring unrecognized callback");
            return;
        };

        let chat = q.chat_id;
        match cb {
            Callback::ResourceMenu(ResourceRef::Container(id)) => {
                self.send(chat, views::container_menu(&id)).await
            }
            Callback::ResourceMenu(ResourceRef::Service(name)) => {
                self.send(chat, views::service_menu(&name)).await
            }
            Callback::BackToContainers => self.show_view(chat, None, View::Containers).await,
            Callback::Container(action, id) => self.container_action(chat, action, &id).await,
            Callback::Service(action, name) => self.service_action(chat, action, &name).await,
            Callback::View(view) => self.show_view(chat, q.message, view).await,
            Callback::Confirm(op) => {
                info!(?op, chat_id = chat.0, "power operation confirmed");
                let res = self.host.power(op).await;
                log_failure("power", &res);
                self.send(chat, views::power_outcome(op, &res)).await;
            }
            Callback::CheckUpdates => self.check_updates(chat).await,
            Callback::UpgradeSystem => {
                self.send(chat, views::upgrade_started()).await;
                info!(chat_id = chat.0, "running system upgrade");
                let res = self.host.upgrade_system().await;
                log_failure("upgrade", &res);
                self.send(chat, views::upgrade_outcome(&res)).await;
            }
        }
    }

    /// Render a view. Sub-menus reached from an existing menu message replace
    /// that message when the messenger can edit; everything else is a new message.
    async fn show_view(&self, chat: ChatId, origin: Option<MessageRef>, view: View) {
        let reply = match view {
            View::MainMenu => views::main_menu(),
            View::Status => {
                let cpu = self.telemetry.cpu_snapshot().await;
                let mem = self.telemetry.memory_snapshot().await;
                let disks = self.telemetry.disk_snapshots().await;
                views::status_report(&cpu, &mem, &disks)
            }
            View::Containers => {
                let containers = self.host.list_containers(None).await;
                log_failure("list containers", &containers);
                views::container_list(&containers)
            }
            View::Services => {
                let services = self.host.list_services().await;
                log_failure("list services", &services);
                return self.replace_or_send(chat, origin, views::service_list(&services)).await;
            }
            View::ServerManagement => {
                return self
                    .replace_or_send(chat, origin, views::server_management_menu())
                    .await
            }
            View::ConfirmPower(op) => views::power_confirmation(op),
        };
        self.send(chat, reply).await;
    }

    async fn container_action(&self, chat: ChatId, action: ContainerAction, id: &ContainerId) {
        let op = match action {
            ContainerAction::Restart => LifecycleOp::Restart,
            ContainerAction::Stop => LifecycleOp::Stop,
            ContainerAction::Start => LifecycleOp::Start,
            ContainerAction::Status => {
                let found = self
                    .host
                    .list_containers(Some(id))
                    .await
                    .and_then(|list| {
                        list.into_iter().next().ok_or_else(|| {
                            Error::External(format!("container {id} not found"))
                        })
                    });
                log_failure("container status", &found);
                self.send(chat, views::container_status(id, &found)).await;
                return;
            }
            ContainerAction::Logs => {
                match self.host.container_logs(id).await {
                    Ok(logs) => {
                        let body = if logs.trim().is_empty() {
                            "(no log output)".to_string()
                        } else {
                            logs
                        };
                        let limit = self.messenger.capabilities().max_message_len;
                        for html in
                            split_pre_messages(&views::container_logs_header(id), &body, limit)
                        {
                            self.send(chat, Reply::text(html)).await;
                        }
                    }
                    Err(e) => {
                        warn!(container = %id, error = %e, "container logs failed");
                        self.send(chat, views::container_logs_failed(id, &e)).await;
                    }
                }
                return;
            }
        };

        info!(container = %id, op = op.as_str(), chat_id = chat.0, "container action");
        let res = self.host.container_lifecycle(op, id).await;
        log_failure("container action", &res);
        self.send(chat, views::container_lifecycle_outcome(op, id, &res))
            .await;
    }

    async fn service_action(&self, chat: ChatId, action: ServiceAction, name: &str) {
        let op = match action {
            ServiceAction::Restart => LifecycleOp::Restart,
            ServiceAction::Stop => LifecycleOp::Stop,
            ServiceAction::Start => LifecycleOp::Start,
            ServiceAction::Status => {
                let res = self.host.service_status(name).await;
                log_failure("service status", &res);
                self.send(chat, views::service_status(name, &res)).await;
                return;
            }
        };

        info!(service = name, op = op.as_str(), chat_id = chat.0, "service action");
        let res = self.host.service_lifecycle(op, name).await;
        log_failure("service action", &res);
        self.send(chat, views::service_lifecycle_outcome(op, name, &res))
            .await;
    }

    async fn check_updates(&self, chat: ChatId) {
        self.send(chat, views::checking_updates()).await;

        let listing = match self.host.check_updates().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "update check failed");
                self.send(chat, views::updates_failed(&e)).await;
                return;
            }
        };

        if count_upgradable_packages(&listing) == 0 {
            self.send(chat, views::all_up_to_date()).await;
            self.show_view(chat, None, View::MainMenu).await;
            return;
        }

        self.send(chat, views::update_listing(&listing)).await;
    }

    async fn replace_or_send(&self, chat: ChatId, origin: Option<MessageRef>, reply: Reply) {
        let Some(msg) = origin.filter(|_| self.messenger.capabilities().supports_edit) else {
            self.send(chat, reply).await;
            return;
        };

        let res = match reply.keyboard {
            Some(kb) => self.messenger.edit_inline_keyboard(msg, &reply.html, kb).await,
            None => self.messenger.edit_html(msg, &reply.html).await,
        };
        if let Err(e) = res {
            warn!(chat_id = chat.0, error = %e, "failed to edit message");
        }
    }

    async fn send(&self, chat: ChatId, reply: Reply) {
        let res = match reply.keyboard {
            Some(kb) => self
                .messenger
                .send_inline_keyboard(chat, &reply.html, kb)
                .await
                .map(|_| ()),
            None => self.messenger.send_html(chat, &reply.html).await.map(|_| ()),
        };
        if let Err(e) = res {
            warn!(chat_id = chat.0, error = %e, "failed to deliver reply");
        }
    }
}

fn log_failure<T>(what: &str, res: &Result<T>) {
    if let Err(e) = res {
        warn!(error = %e, "{what} failed");
    }
}
