pub mod config_io;
pub mod hook;
pub mod lock;
pub mod recovery;
pub mod store;
