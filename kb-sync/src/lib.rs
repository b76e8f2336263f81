pub mod cli;
pub mod dify;
pub mod error;
pub mod gitlab;
pub mod http;
pub mod load_config;

pub use cli::{run, Cli, Commands};
