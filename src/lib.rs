pub mod config;
pub mod database;
pub mod datasheet;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod services;
