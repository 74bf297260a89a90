pub mod analysis_state;
pub mod image_record;
pub mod observation;

pub use analysis_state::{AnalysisState, AnalysisStatus, StateSurface};
pub use image_record::ImageRecord;
pub use observation::{Observation, ObservedSize};
