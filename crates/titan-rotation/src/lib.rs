//! titan-rotation — the background driver that scans sessions needing key
//! rotation and pushes rotation requests through an abstract transport.

pub mod driver;
pub mod transport;

pub use driver::{run_sweep, spawn_rotation_driver, RotationSweepReport, DEFAULT_ROTATION_INTERVAL};
pub use transport::{RotationPushFailure, RotationTransport};
