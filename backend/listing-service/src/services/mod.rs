pub mod credentials;
pub mod image_processing;
pub mod listings;
