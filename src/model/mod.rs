pub mod config;
pub mod project;
pub mod record;

pub use config::*;
pub use project::*;
pub use record::*;
