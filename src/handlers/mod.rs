pub mod batches;
pub mod cards;
pub mod common;
pub mod health;
pub mod lots;
pub mod setups;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    AdjustmentService, BatchService, CardService, LotStatusService, SetupService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub batches: Arc<BatchService>,
    pub cards: Arc<CardService>,
    pub adjustments: Arc<AdjustmentService>,
    pub lot_status: Arc<LotStatusService>,
    pub setups: Arc<SetupService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        Self {
            batches: Arc::new(BatchService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.discrepancy_alert_threshold,
            )),
            cards: Arc::new(CardService::new(db_pool.clone(), event_sender.clone())),
            adjustments: Arc::new(AdjustmentService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            lot_status: Arc::new(LotStatusService::new(db_pool.clone(), event_sender.clone())),
            setups: Arc::new(SetupService::new(db_pool, event_sender)),
        }
    }
}
