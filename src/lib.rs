#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod params;
pub mod prefs;
pub mod render;
pub mod repl;
pub mod router;
pub mod server;
pub mod session;
pub mod store;
