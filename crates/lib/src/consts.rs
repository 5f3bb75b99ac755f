/// Application name used for temp file prefixes and lock metadata.
pub const APP_NAME: &str = "hoist";

/// Manifest format versions this installer knows how to apply.
pub const SUPPORTED_FORMATS: &[u32] = &[1];

/// Token in wrapper templates replaced with the relative path to the link source.
pub const WRAPPER_PLACEHOLDER: &str = "__REL_PATH__";

/// Environment variable overriding the install root.
pub const ROOT_ENV: &str = "HOIST_ROOT";

/// Environment variable enabling debug logging when set to `1`.
pub const DEBUG_ENV: &str = "HOIST_DEBUG";

/// Environment variable forcing every download through the HTTP proxy when set to `1`.
pub const FORCE_HTTP_ENV: &str = "HOIST_FORCE_HTTP";

/// Environment variable holding the prefix for global shortcuts. Empty disables them.
pub const PREFIX_ENV: &str = "HOIST_PREFIX";

/// Redirect count at which a download gives up: the 10th `Location` fails.
pub const MAX_REDIRECTS: u32 = 10;
