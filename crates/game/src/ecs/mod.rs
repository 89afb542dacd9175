mod entity;
mod registry;
mod storage;

pub use entity::Entity;
pub use registry::{Registry, System};
pub use storage::Storage;
