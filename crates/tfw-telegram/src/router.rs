use std::{future::Future, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

use tfw_core::{config::Config, controller::ForwardingController, messaging::port::MessagingPort};

use crate::directory::ChatDirectory;
use crate::handlers;
use crate::transport::TelegramTransport;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub controller: Arc<ForwardingController>,
    pub messenger: Arc<dyn MessagingPort>,
    pub directory: Arc<ChatDirectory>,
    pub runs: Arc<RunTasks>,
}

/// Forwarding runs spawned by commands, awaited on shutdown so a send in
/// flight is never dropped with the runtime.
#[derive(Default)]
pub struct RunTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RunTasks {
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(tokio::spawn(task));
    }

    pub async fn join_all(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "forwarding task failed");
            }
        }
    }
}

/// Serve commands until Ctrl-C, then persist the cursor.
pub async fn run_polling(
    cfg: Arc<Config>,
    transport: &TelegramTransport,
    controller: Arc<ForwardingController>,
) -> anyhow::Result<()> {
    let bot = transport.bot();

    match bot.get_me().await {
        Ok(me) => info!(bot = %me.username(), "forwarder started"),
        Err(e) => warn!(error = %e, "getMe failed; continuing"),
    }
    info!(
        allowed_users = cfg.telegram_allowed_users.len(),
        cursor_file = %cfg.cursor_file.display(),
        "configuration loaded"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        cfg,
        controller: controller.clone(),
        messenger,
        directory: transport.directory(),
        runs: Arc::new(RunTasks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_channel_post().endpoint(handlers::handle_channel_post));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Shutting down: signal any active run, let its current send finish, then
    // save progress.
    if let Err(e) = controller.stop().await {
        warn!(error = %e, "failed to persist cursor on shutdown");
    }
    state.runs.join_all().await;
    if let Err(e) = controller.stop().await {
        warn!(error = %e, "failed to persist cursor on shutdown");
    }

    Ok(())
}
