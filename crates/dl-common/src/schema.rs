//! Cache format versioning.

/// Format version written into every JSON cache artifact.
///
/// Follows semver: a different MAJOR version means the artifact is treated as
/// corrupt and rebuilt.
pub const CACHE_FORMAT_VERSION: &str = "1.0.0";

/// Check if a cache format version is readable by this build.
pub fn is_compatible(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().and_then(|s| s.parse::<u32>().ok());
    match (major(CACHE_FORMAT_VERSION), major(version)) {
        (Some(current), Some(other)) => current == other,
        _ => false,
    }
}
