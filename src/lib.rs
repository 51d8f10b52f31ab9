pub mod cmd;
pub mod config;
pub mod errors;
pub mod manifest;
pub mod patterns;
pub mod pipeline;
pub mod quota;
