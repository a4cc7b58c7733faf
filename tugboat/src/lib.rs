pub mod cancel;
pub mod driver;
pub mod error;
pub mod executor;
pub mod process;
pub mod reference;
pub mod registry;
pub mod workflow;

pub(crate) mod config;
pub(crate) mod git;
pub(crate) mod template;
pub(crate) mod version;

pub mod cli;

pub use error::Error;

pub(crate) type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;
