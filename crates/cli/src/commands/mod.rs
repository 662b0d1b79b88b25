pub mod build;
pub mod config_cmd;
pub mod context;
pub mod links;
pub mod runtime;
