use std::sync::Arc;

use application::HubClient;
use tokio_util::sync::CancellationToken;

use crate::hub::LinesHub;
use crate::snapshot::SnapshotSource;

#[derive(Clone)]
pub struct AppState {
    pub hub: LinesHub,
    pub broadcaster: Arc<dyn HubClient>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        hub: LinesHub,
        broadcaster: Arc<dyn HubClient>,
        snapshots: Arc<dyn SnapshotSource>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            broadcaster,
            snapshots,
            shutdown,
        }
    }
}
