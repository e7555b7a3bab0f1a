use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Logs go to stderr; stdout carries only result records.
pub fn init_logger() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("rsvp=info"));
    builder.target(Target::Stderr);
    builder.filter_module("wgpu", LevelFilter::Warn);
    builder.filter_module("naga", LevelFilter::Warn);
    builder.filter_module("winit", LevelFilter::Warn);
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}
