pub mod app;
pub mod archive;
pub mod artifacts;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod invite;
pub mod models;
pub mod pages;
pub mod render;
pub mod route;
pub mod state;
pub mod storage;

pub use app::build_router;
