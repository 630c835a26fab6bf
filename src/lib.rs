pub mod config;
pub mod environment;
pub mod errors;
pub mod hardware;
pub mod interpreter;
pub mod script;
