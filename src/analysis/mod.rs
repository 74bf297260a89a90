//! Orchestration of a single analysis run against the browser.

pub mod browser;
pub mod controller;

pub use browser::{Browser, Viewport, WindowInfo, WindowState};
pub use controller::{AnalysisController, RunHandle, RunOutcome, ViewportRequest};
