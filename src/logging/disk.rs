//! Free disk space queries.

use std::path::Path;

/// Free space available to unprivileged users on the filesystem holding
/// `path`, in megabytes. Walks up to the nearest existing ancestor so it
/// can be asked about directories that have not been created yet.
#[cfg(unix)]
pub fn free_space_mb(path: &Path) -> Option<u64> {
    use std::os::unix::ffi::OsStrExt;

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let existing = absolute.ancestors().find(|p| p.exists())?;
    let c_path = std::ffi::CString::new(existing.as_os_str().as_bytes()).ok()?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return None;
    }

    let avail = stat.f_bavail as u64 * stat.f_frsize as u64;
    Some(avail / (1024 * 1024))
}

#[cfg(not(unix))]
pub fn free_space_mb(_path: &Path) -> Option<u64> {
    None
}

/// True when the filesystem is known to have less than `min_mb` free.
/// Unknown free space is never reported as low.
pub fn is_low_on_space(path: &Path, min_mb: u64) -> bool {
    matches!(free_space_mb(path), Some(free) if free < min_mb)
}
