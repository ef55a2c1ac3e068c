use std::sync::Arc;

use vital_core::routing::HandlerDescriptor;
use vital_router::RouterAdapter;

#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<RouterAdapter>,
    /// Roster snapshot taken at boot; the roster is immutable after that.
    pub descriptors: Arc<Vec<HandlerDescriptor>>,
}

impl AppState {
    pub fn new(adapter: Arc<RouterAdapter>) -> Self {
        let descriptors = Arc::new(adapter.router().descriptors());
        Self {
            adapter,
            descriptors,
        }
    }
}
