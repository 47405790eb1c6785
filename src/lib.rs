pub mod cli;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod html;
pub mod models;
pub mod package;
pub mod period;
pub mod render;
pub mod status;
pub mod workspace;
