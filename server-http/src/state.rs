use recordstore::RecordClient;
use std::sync::Arc;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordClient>,
}

impl AppState {
    pub fn new(records: Arc<dyn RecordClient>) -> Self {
        Self { records }
    }
}
