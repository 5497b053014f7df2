use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::db::Store;
use crate::services::chat::ChatProvider;
use crate::services::events::BookingEvent;
use crate::services::ratings::RatingsProvider;

pub struct AppState {
    pub store: Store,
    pub config: AppConfig,
    pub chat: Box<dyn ChatProvider>,
    pub ratings: Box<dyn RatingsProvider>,
    pub events_tx: broadcast::Sender<BookingEvent>,
}
