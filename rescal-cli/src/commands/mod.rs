pub mod calendar;
pub mod config;
pub mod events;
pub mod init;
pub mod resources;
