pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod poll;
pub mod report;
pub mod scheduler;
pub mod speech;
pub mod submit;
pub mod util;
