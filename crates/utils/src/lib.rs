pub mod assets;
pub mod response;
