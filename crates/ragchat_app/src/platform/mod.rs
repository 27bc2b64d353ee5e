mod app;
pub mod config;
mod effects;
pub mod logging;
mod timers;
mod ui;

pub use app::run;
