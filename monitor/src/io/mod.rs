//! I/O helpers: configuration files and the notification feed.

pub mod config;
pub mod feed;
