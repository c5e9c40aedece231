pub mod store;

pub use store::{keys, StateStore};
