pub mod cache;
pub mod gateway;
pub mod schema;

pub use cache::ObjectCache;
pub use gateway::Store;
