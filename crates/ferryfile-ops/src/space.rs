//! Free space checks on the destination filesystem.

use std::path::Path;

use ferryfile_core::{EngineError, IoOp};

/// Bytes available to an unprivileged user on the filesystem holding `path`.
#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn available_space(path: &Path) -> Result<u64, EngineError> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
        EngineError::io(
            IoOp::Metadata,
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        )
    })?;

    let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
    // SAFETY: statvfs is a standard POSIX function, c_path is a valid C string
    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result != 0 {
        return Err(EngineError::io(
            IoOp::Metadata,
            path,
            std::io::Error::last_os_error(),
        ));
    }
    // SAFETY: statvfs succeeded, stat is initialized
    let stat = unsafe { stat.assume_init() };

    Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

/// Without statvfs the check is skipped.
#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> Result<u64, EngineError> {
    Ok(u64::MAX)
}

/// Fail with `InsufficientSpace` when `required` bytes do not fit.
pub fn ensure_space(path: &Path, required: u64) -> Result<(), EngineError> {
    if required == 0 {
        return Ok(());
    }
    let available = available_space(path)?;
    if available < required {
        return Err(EngineError::InsufficientSpace {
            path: path.to_path_buf(),
            required,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_space_on_temp() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(available_space(temp.path()).unwrap() > 0);
    }

    #[test]
    fn test_ensure_space_rejects_huge_request() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = ensure_space(temp.path(), u64::MAX).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientSpace { .. }));
        assert!(ensure_space(temp.path(), 0).is_ok());
    }
}
