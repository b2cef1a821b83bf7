pub mod analyzer;
pub mod categories;
pub mod config;
pub mod email;
pub mod market;
pub mod narrative;
pub mod pipeline;
pub mod places;
pub mod review_file;
pub mod session;
pub mod types;
