/// The compile-time version string reported by `GET_HELPER_VERSION`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
