use anyhow::Error;
use log::error;

use calendar_sync_http::app::start_app;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    start_app().await.map_err(|e| {
        error!("calendar-sync-http exited: {e}");
        Error::new(e)
    })
}
