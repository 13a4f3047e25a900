use std::path::Path;

use super::types::FilesystemStat;
use crate::error::{MetricError, MetricResult};

/// Used fraction of a filesystem, `1 - free / total`.
///
/// Block size cancels out of the ratio. A zero-block filesystem has no
/// meaningful usage and is reported as `NoUsableData`.
pub fn disk_usage(stat: &FilesystemStat) -> MetricResult<f64> {
    if stat.total_blocks == 0 {
        return Err(MetricError::NoUsableData {
            origin: "statvfs",
            detail: "filesystem reports zero blocks".to_string(),
        });
    }
    let free = stat.free_blocks.min(stat.total_blocks);
    Ok(1.0 - free as f64 / stat.total_blocks as f64)
}

/// Queries `statvfs` for the filesystem holding `path`.
#[cfg(unix)]
pub fn read_filesystem_stat(path: &Path) -> MetricResult<FilesystemStat> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let io_error = |source: std::io::Error| MetricError::Io {
        path: path.display().to_string(),
        source,
    };

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
        io_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;

    let mut buf = MaybeUninit::<libc::statvfs>::uninit();
    let result = unsafe { libc::statvfs(c_path.as_ptr(), buf.as_mut_ptr()) };
    if result != 0 {
        return Err(io_error(std::io::Error::last_os_error()));
    }
    let buf = unsafe { buf.assume_init() };

    // Field widths differ between platforms.
    #[allow(clippy::unnecessary_cast)]
    let stat = FilesystemStat {
        total_blocks: buf.f_blocks as u64,
        free_blocks: buf.f_bfree as u64,
        block_size: buf.f_frsize as u64,
    };
    Ok(stat)
}

#[cfg(not(unix))]
pub fn read_filesystem_stat(_path: &Path) -> MetricResult<FilesystemStat> {
    Err(MetricError::Unsupported("filesystem statistics"))
}
