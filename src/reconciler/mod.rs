pub mod controller;
pub mod pass;
pub mod state;

pub use controller::{BatchReconciler, FlushReport, ReconcilerConfig, ReconcilerSnapshot};
pub use pass::MIN_IMAGE_BYTES;
pub use state::ReconcilerPhase;
