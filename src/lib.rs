pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export main modules
pub use domain::lifecycle;
pub use domain::orchestration;
pub use infrastructure::logging;
