use std::{sync::Arc, time::Duration};

use anyhow::Context;

use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::Polling,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hostbot_core::dispatcher::Dispatcher as CoreDispatcher;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CoreDispatcher>,
}

/// Headroom between the long-poll timeout and the HTTP client timeout.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// HTTP timeout for a client that long-polls with `poll_timeout`; an idle
/// poll must end on the server side before the client gives up.
pub fn http_timeout(poll_timeout: Duration) -> Duration {
    poll_timeout + HTTP_TIMEOUT_MARGIN
}

/// Build the bot client and check the token with `getMe`.
pub async fn connect(token: &str, poll_timeout: Duration) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(http_timeout(poll_timeout))
        .build()
        .context("failed to build telegram http client")?;
    let bot = Bot::with_client(token, client);
    let me = bot.get_me().await.context("telegram getMe failed")?;
    info!(username = %me.username(), "connected to telegram");
    Ok(bot)
}

/// Long-polls Telegram and feeds every update to the core dispatcher, one at
/// a time, until `shutdown` is cancelled. The update in flight is allowed to
/// finish before this returns.
pub async fn run_polling(
    bot: Bot,
    dispatcher: Arc<CoreDispatcher>,
    poll_timeout: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState { dispatcher });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut tg_dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        // Single key: updates are handled strictly in arrival order.
        .distribution_function(|_| Some(()))
        .default_handler(|_| async {
            debug!("ignoring unsupported update");
        })
        .build();

    let watcher = tokio::spawn(stop_on_cancel(tg_dispatcher.shutdown_token(), shutdown));

    let listener = Polling::builder(bot).timeout(poll_timeout).build();
    info!(timeout_secs = poll_timeout.as_secs(), "polling for updates");
    tg_dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("error from the update listener"),
        )
        .await;

    watcher.abort();
    info!("update dispatcher stopped");
    Ok(())
}

async fn stop_on_cancel(token: ShutdownToken, shutdown: CancellationToken) {
    shutdown.cancelled().await;
    // The dispatcher may not have started yet; keep asking until it has.
    loop {
        match token.shutdown() {
            Ok(done) => {
                info!("stopping update dispatcher");
                done.await;
                return;
            }
            Err(_) => {
                warn!("update dispatcher idle, retrying shutdown");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
