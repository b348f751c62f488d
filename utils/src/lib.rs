mod config;
mod diff;
mod logging;
mod string_utils;
mod time;
mod versioning;

pub use config::{config_from_lookup, load_config, log_config};
pub use diff::unified_diff;
pub use logging::{parse_level, setup_logging};
pub use string_utils::{
    capitalize_words, redact, short_sha, truncate_description, truncate_lines,
    MAX_STATUS_DESCRIPTION_LEN, TRUNCATED_SUFFIX,
};
pub use time::{get_display_timestamp, get_timestamp};
pub use versioning::{check_min_version, semver_parse_without_build, MIN_PLATFORM_VERSION};
