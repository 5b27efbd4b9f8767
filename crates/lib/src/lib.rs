//! assetpack-lib: Core types and logic for AssetPack
//!
//! This crate builds declared asset bundles into content-addressed artifacts:
//! - `AssetPack`: the controller hosts declare and query bundles through
//! - `Pipeline`: resolve, checksum, cache check, transform and persist
//! - `FallbackPolicy`: what to serve when a build fails
//! - `ContentStore` / `MappingStore`: artifacts and the persisted moniker map

pub mod config;
pub mod consts;
pub mod error;
pub mod fallback;
pub mod mapping;
pub mod moniker;
pub mod pack;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod transform;
pub mod util;

pub use config::Config;
pub use error::{AssetPackError, BuildError};
pub use moniker::Moniker;
pub use pack::{AssetPack, Assets, GetOptions, PurgeOptions, PurgeReport};
pub use transform::{CommandSpec, CommandTransform, Transform, TransformRegistry};
