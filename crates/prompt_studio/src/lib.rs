pub mod config;
pub mod controllers;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use server::{app_config, AppState};
