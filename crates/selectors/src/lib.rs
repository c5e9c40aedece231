pub mod cache;
pub mod fallback;

pub use cache::{FallbackPolicy, SelectorCache};
pub use fallback::builtin_selectors;
