//! Crate-wide constants.

/// Application name used in log targets and error banners.
pub const APP_NAME: &str = "AssetPack";

/// Name of the artifact directory inside a static root.
pub const PACKED_DIR: &str = "packed";

/// Name of the persisted moniker mapping inside an artifact directory.
pub const MAP_FILENAME: &str = "map.json";

/// Subdirectory of the output directory holding downloaded remote sources.
pub const FETCH_CACHE_DIR: &str = "cache";

/// Number of hex characters in a [`Checksum`](crate::util::hash::Checksum).
pub const CHECKSUM_LEN: usize = 32;

/// Maximum number of redirects followed when fetching a remote source.
pub const MAX_REDIRECTS: usize = 3;

/// Runtime mode in which errors are shown in-page instead of aborting.
pub const DEVELOPMENT_MODE: &str = "development";
