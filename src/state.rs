use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{DbPool, OrmConn};
use crate::gateway::PaymentGateway;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: AppConfig,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}
