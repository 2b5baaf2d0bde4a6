pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod intercept;
pub mod logging;
pub mod output;
pub mod schema;
pub mod session;
