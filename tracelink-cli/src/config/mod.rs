mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{DEFAULT_HOST, DEFAULT_PORT, TracelinkConfig};
