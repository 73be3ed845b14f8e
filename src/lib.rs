pub mod agents;
pub mod blueprint;
pub mod config;
pub mod emit;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod service;
pub mod worker;
