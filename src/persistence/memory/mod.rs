mod core;
mod directory;
mod journal;
mod store;

pub use self::core::MemoryPersistence;
