use std::sync::Arc;

use crate::core::directory::Directory;
use crate::core::ledger::{OrderLedger, TransitionPolicy};
use crate::core::session::SessionHolder;
use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::store::BlobStore;

pub struct AppState {
    pub directory: Directory,
    pub sessions: SessionHolder,
    pub ledger: OrderLedger,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>, policy: TransitionPolicy) -> Result<Self, AppError> {
        Ok(Self {
            directory: Directory::new(store.clone()),
            sessions: SessionHolder::new(store.clone()),
            ledger: OrderLedger::new(store, policy)?,
            metrics: Metrics::new(),
        })
    }
}
