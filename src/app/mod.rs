pub mod context;

pub use context::{AppContext, StoreSet};
