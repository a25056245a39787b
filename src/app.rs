use std::sync::Arc;

use crate::config::Settings;
use crate::database::Database;
use crate::pipeline::Dispatcher;
use crate::properties::PropertyStore;
use crate::storage::Storage;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub settings: Settings,
    pub database: Arc<dyn Database>,
    pub property_store: Arc<dyn PropertyStore>,
    pub storage: Arc<dyn Storage>,
    pub dispatcher: Arc<dyn Dispatcher>,
}
