pub mod config;
pub mod handlers;
pub mod matching;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;
