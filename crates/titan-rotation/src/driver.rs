//! The rotation driver's periodic sweep, spawned the way `guard-service`'s
//! `engine` module spawns its maintenance and daily-anchor watchers: a
//! `tokio::select!` between a fixed-interval sleep and a `watch` shutdown
//! signal, so the task stops cooperatively instead of being aborted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use titan_session::SessionManager;

use crate::transport::RotationTransport;

/// One sweep: clean up expired grace keys, then initiate rotation for every
/// user whose key is due, pushing the resulting `KeyRotationRequest`
/// through the transport. Never blocks the main dispatch path — failures
/// are logged and counted, not propagated.
pub async fn run_sweep<T: RotationTransport>(
    session_manager: &SessionManager,
    transport: &T,
) -> RotationSweepReport {
    let expired = session_manager.cleanup_expired_previous_keys().await;

    let mut rotated = 0usize;
    let mut push_failures = 0usize;
    for user_id in session_manager.user_ids() {
        if !session_manager.needs_rotation(&user_id).await {
            continue;
        }
        match session_manager.initiate_rotation(&user_id).await {
            Ok(request) => {
                if let Err(err) = transport.push_rotation_request(&user_id, &request).await {
                    push_failures += 1;
                    warn!(user_id = %user_id, error = %err, "failed to push rotation request");
                } else {
                    rotated += 1;
                    debug!(user_id = %user_id, new_key_id = %request.new_key_id, "rotation pushed");
                }
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to initiate rotation");
            }
        }
    }

    if rotated > 0 || expired > 0 {
        info!(rotated, expired, push_failures, "rotation sweep complete");
    }
    RotationSweepReport { expired_previous_keys: expired, rotated, push_failures }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSweepReport {
    pub expired_previous_keys: usize,
    pub rotated: usize,
    pub push_failures: usize,
}

/// Spawn the driver as a background task on `interval`, stopping when
/// `shutdown` is set to `true`.
pub fn spawn_rotation_driver<T: RotationTransport + 'static>(
    session_manager: Arc<SessionManager>,
    transport: Arc<T>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    run_sweep(&session_manager, transport.as_ref()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    })
}

/// Default sweep cadence (spec §5: "every 30 s").
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(30);
