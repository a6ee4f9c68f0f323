// tests/property/main.rs

mod config;
mod queue;
