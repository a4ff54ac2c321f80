//! CLI command modules.

pub mod http;
pub mod profiles;
pub mod sessions;
pub mod status;
