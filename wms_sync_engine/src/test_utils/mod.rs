//! Helpers for tests that exercise the engine against a real SQLite database and a scripted carrier platform.
pub mod fake_carrier;
pub mod fixtures;
pub mod prepare_env;
