//! Network side of the pipeline: turning response headers into observations
//! and handing them to whoever consumes them.

pub mod dispatch;
pub mod observer;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use observer::{observe, BlockingResponse, NetworkObserver, ObserverEvent, ResponseDetails};
