//! DOM correlation: which element rendered a given image url.

pub mod background;
pub mod locator;
pub mod snapshot;

pub use locator::{ElementLocator, LocatedElement};
pub use snapshot::{DocumentSnapshot, ElementSnapshot, LiveDocument};
