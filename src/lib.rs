pub mod artifacts;
pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod label;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod text;
pub mod vectorize;
