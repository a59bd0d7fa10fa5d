use std::sync::Arc;

use tfw_core::{
    config::Config, controller::ForwardingController, cursor::CursorStore, job::ForwardSettings,
};
use tfw_telegram::transport::TelegramTransport;

#[tokio::main]
async fn main() -> Result<(), tfw_core::Error> {
    tfw_core::logging::init("tfw")?;

    let cfg = Arc::new(Config::load()?);

    let transport = TelegramTransport::connect(&cfg);
    let controller = Arc::new(ForwardingController::new(
        ForwardSettings::from_config(&cfg),
        Arc::new(transport.clone()),
        CursorStore::new(&cfg.cursor_file),
    )?);

    tfw_telegram::router::run_polling(cfg, &transport, controller)
        .await
        .map_err(|e| tfw_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
