#![allow(clippy::useless_conversion)]

pub mod ids;
pub mod project;
pub mod role;
pub mod skill;
pub mod todo;
pub mod user;
