pub mod helpers;
mod secret;

pub use helpers::{env_or_default, parse_boolean_flag};
pub use secret::Secret;
