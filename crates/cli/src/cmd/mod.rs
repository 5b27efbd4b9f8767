pub mod build;
mod fetch;
mod get;
mod purge;

pub use build::cmd_build;
pub use fetch::cmd_fetch;
pub use get::cmd_get;
pub use purge::cmd_purge;
