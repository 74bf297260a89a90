mod analysis_state;
mod image_records;
mod pending_images;
