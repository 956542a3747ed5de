pub mod model_loaders;

pub use model_loaders::{load_project_middleware, load_todo_middleware};
