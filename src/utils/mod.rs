pub mod logging;

pub use logging::{debug_from_env, init_logging};
