pub mod config;
pub mod error;
pub mod frontend;
pub mod manager;
pub mod process;
pub mod request;
pub mod scheduler;
pub mod shutdown;
