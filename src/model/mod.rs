pub mod config;
pub mod entity;
pub mod location;

pub use config::*;
pub use entity::*;
pub use location::*;
