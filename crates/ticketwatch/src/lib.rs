pub mod config;
pub mod decision;
pub mod extractor;
pub mod history;
pub mod notify;
pub mod render;
mod report;
pub mod tracker;
pub mod types;

pub use config::{ConfigError, TrackerConfig};
pub use notify::SmtpNotifier;
pub use render::HttpRenderer;
pub use tracker::{RunReport, Tracker};
