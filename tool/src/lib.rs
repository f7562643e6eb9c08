pub mod backfill;
pub mod cache;
pub mod chain;
pub mod config;
pub mod env;
pub mod generate;
pub mod inspect;
pub mod printer;
pub mod provider;
pub mod retry;
pub mod stream_file;
pub mod tracing;

/// Common information for the `--version` CLI flags.
pub fn version() -> String {
    let pkg_name = env!("CARGO_PKG_NAME");
    let pkg_version = env!("CARGO_PKG_VERSION");
    format!("{pkg_name} {pkg_version}")
}
