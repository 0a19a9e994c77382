pub mod api;
pub mod categories;
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod observer;
pub mod poll_policy;
pub mod report;
pub mod request;
pub mod settings;
pub mod upload;
pub mod util;
