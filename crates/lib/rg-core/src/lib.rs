#[macro_use]
extern crate log as _log; // avoid name collision with our own `log` module

pub mod config;
pub mod error;
pub mod log;
pub mod thread_pool;

pub extern crate thiserror;
