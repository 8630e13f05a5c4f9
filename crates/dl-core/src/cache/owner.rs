use dl_config::Ownership;
use std::path::PathBuf;
use tracing::warn;

/// Hand `paths` to the configured user and group.
///
/// Best effort: an unknown user or group, or a denied `chown`, is logged and
/// otherwise ignored. Without a group the user's primary group is used.
pub fn apply_ownership(paths: &[PathBuf], ownership: &Ownership) {
    #[cfg(unix)]
    {
        let Some((uid, primary_gid)) = lookup_user(&ownership.user) else {
            warn!(user = %ownership.user, "cache owner not found, keeping current owner");
            return;
        };
        let gid = match &ownership.group {
            Some(group) => match lookup_group(group) {
                Some(gid) => gid,
                None => {
                    warn!(%group, "cache group not found, using primary group");
                    primary_gid
                }
            },
            None => primary_gid,
        };
        for path in paths {
            if let Err(e) = std::os::unix::fs::chown(path, Some(uid), Some(gid)) {
                warn!(path = %path.display(), error = %e, "unable to change cache directory owner");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (paths, ownership);
        warn!("cache directory ownership is only supported on unix");
    }
}

#[cfg(unix)]
fn lookup_user(name: &str) -> Option<(u32, u32)> {
    let name = std::ffi::CString::new(name).ok()?;
    // getpwnam returns a pointer into static storage; copy out immediately.
    let entry = unsafe { libc::getpwnam(name.as_ptr()) };
    if entry.is_null() {
        return None;
    }
    let (uid, gid) = unsafe { ((*entry).pw_uid, (*entry).pw_gid) };
    Some((uid, gid))
}

#[cfg(unix)]
fn lookup_group(name: &str) -> Option<u32> {
    let name = std::ffi::CString::new(name).ok()?;
    let entry = unsafe { libc::getgrnam(name.as_ptr()) };
    if entry.is_null() {
        return None;
    }
    Some(unsafe { (*entry).gr_gid })
}
