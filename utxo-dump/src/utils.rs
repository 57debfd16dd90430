use libc::{rlimit, setrlimit, RLIMIT_NOFILE};

const OPEN_FILES_LIMIT: libc::rlim_t = 4_096;

/// Raises the soft and hard limit of open files for LevelDB's table files.
pub(crate) fn raise_open_files_limit() {
    let lim = rlimit {
        rlim_cur: OPEN_FILES_LIMIT,
        rlim_max: OPEN_FILES_LIMIT,
    };

    let ret = unsafe { setrlimit(RLIMIT_NOFILE, &lim) };
    if ret != 0 {
        tracing::warn!(
            "Failed to set rlimit: {}",
            std::io::Error::last_os_error()
        );
    } else {
        tracing::info!("Updated RLIMIT_NOFILE to {}", OPEN_FILES_LIMIT);
    }
}
