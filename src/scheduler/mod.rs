//! External trigger for periodic monitoring cycles.

pub mod engine;

pub use self::engine::run_monitor_loop;
