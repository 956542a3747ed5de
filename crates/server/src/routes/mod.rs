pub mod auth;
pub mod health;
pub mod projects;
pub mod settings;
pub mod todos;
pub mod users;
