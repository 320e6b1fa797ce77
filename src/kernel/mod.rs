pub mod arbitrator;
pub mod candidate;
pub mod config;
pub mod context;
pub mod enforcement;
pub mod engine;
pub mod governance;
pub mod heal;
pub mod state_tag;
pub mod telemetry;
