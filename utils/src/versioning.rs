// Platform versions are reported as e.g. "v2.12.3+6b9cd82". The build suffix
// and the "v" prefix are dropped before comparing against the minimum.

pub const MIN_PLATFORM_VERSION: &str = "2.12.0";

pub fn semver_parse_without_build(ver_str: &str) -> Result<semver::Version, semver::Error> {
    let trimmed = ver_str.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let trimmed = match trimmed.split_once('+') {
        Some((version, _build)) => version,
        None => trimmed,
    };
    semver::Version::parse(trimmed)
}

/// Fails if `version` cannot be parsed or is older than `min_version`.
pub fn check_min_version(version: &str, min_version: &str) -> Result<(), String> {
    let current = semver_parse_without_build(version)
        .map_err(|e| format!("unable to parse version {:?}: {}", version, e))?;
    let minimum = semver_parse_without_build(min_version)
        .map_err(|e| format!("unable to parse minimum version {:?}: {}", min_version, e))?;

    if current < minimum {
        return Err(format!(
            "version {} is older than the minimum supported {}",
            version, min_version
        ));
    }
    Ok(())
}
