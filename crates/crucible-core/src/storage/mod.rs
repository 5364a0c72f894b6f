pub mod store;

pub use store::{ScopedStorage, Store, DEFAULT_NAMESPACE};
