use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hostbot_core::{
    alerting::{AlertMonitor, Thresholds},
    config::Config,
    dispatcher::Dispatcher,
    messaging::port::MessagingPort,
    telemetry::TelemetrySource,
    Error,
};
use hostbot_host::{HostOptions, HostSurface, SysinfoTelemetry};
use hostbot_telegram::{router, TelegramMessenger};

#[tokio::main]
async fn main() -> Result<(), Error> {
    hostbot_core::logging::init("hostbot")?;

    let cfg = Config::load()?;

    let bot = router::connect(&cfg.bot.token, cfg.update_timeout())
        .await
        .map_err(|e| Error::External(format!("{e:#}")))?;

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let telemetry: Arc<dyn TelemetrySource> = Arc::new(SysinfoTelemetry::new());
    let host = Arc::new(HostSurface::new(&HostOptions::from_config(&cfg)));
    host.log_docker_availability().await;

    let allow_list = cfg.allow_list();
    let first_allowed = allow_list.first();
    info!(allowed_chats = allow_list.len(), "authorization gate ready");

    let dispatcher = Arc::new(Dispatcher::new(
        allow_list,
        telemetry.clone(),
        host,
        messenger.clone(),
    ));

    let alerts = match (cfg.check_interval(), cfg.alert_destination()) {
        (Some(period), Some(destination)) => Some(
            AlertMonitor::new(
                Thresholds::from(&cfg.monitoring),
                telemetry,
                messenger,
                destination,
                first_allowed,
            )
            .start(period),
        ),
        _ => {
            info!("threshold alerts disabled");
            None
        }
    };

    let shutdown = CancellationToken::new();
    let mut polling = tokio::spawn(router::run_polling(
        bot,
        dispatcher,
        cfg.update_timeout(),
        shutdown.clone(),
    ));

    let polling_result = tokio::select! {
        _ = wait_for_signal() => {
            info!("shutdown requested");
            None
        }
        res = &mut polling => Some(res),
    };

    // Alerts first, then drain the dispatcher.
    if let Some(alerts) = alerts {
        alerts.stop().await;
    }
    shutdown.cancel();
    let polling_result = match polling_result {
        Some(res) => res,
        None => polling.await,
    };

    match polling_result {
        Ok(Ok(())) => {
            info!("bye");
            Ok(())
        }
        Ok(Err(e)) => Err(Error::External(format!("telegram bot failed: {e:#}"))),
        Err(e) => {
            error!(error = %e, "polling task panicked");
            Err(Error::External(format!("polling task failed: {e}")))
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM; only Ctrl-C will stop the bot");
            ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
