use crate::{config::Config, services::propagation::EventSender};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    /// Schedules payslip recomputation after structure and tax writes
    pub events: EventSender,
}

impl AppState {
    pub fn new(db: PgPool, config: Arc<Config>, events: EventSender) -> Self {
        Self { db, config, events }
    }
}
