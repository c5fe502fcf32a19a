pub mod error;
pub mod evidence;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod types;
pub mod workflow;
