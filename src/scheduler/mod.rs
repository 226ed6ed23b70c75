pub mod settlement_retry;
pub mod status_poller;

use tokio::task::JoinHandle;

use crate::state::AppState;

/// Start the two reconciliation jobs. They share no in-process state and
/// coordinate only through the persisted refund and retry-schedule rows.
pub fn spawn(state: AppState) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(status_poller::run(state.clone())),
        tokio::spawn(settlement_retry::run(state)),
    ]
}
