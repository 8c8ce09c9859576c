pub mod backend;
pub mod bridge;
pub mod config;
pub mod display;
pub mod error;
pub mod event;
pub mod logging;
pub mod quick_response;
pub mod readiness;
pub mod shell;
pub mod store;
