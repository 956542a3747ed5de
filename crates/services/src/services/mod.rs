pub mod ai_service;
pub mod auth;
pub mod config;
pub mod graph;
pub mod project;
