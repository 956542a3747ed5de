pub mod project;
pub mod project_member;
pub mod role;
pub mod skill;
pub mod todo;
pub mod user;
pub mod user_skill;
