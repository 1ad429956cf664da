// Unitwatch - Systemd Service Change Watcher
// Library root

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod systemd;
pub mod watcher;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod store_tests;
#[cfg(test)]
mod test_support;
