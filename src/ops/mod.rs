pub mod filter;
pub mod projects;
pub mod search;
pub mod write;
