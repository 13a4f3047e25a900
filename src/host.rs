use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Identity of the machine this process runs on. Each lookup is independent;
/// a failed one leaves its field empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
    pub architecture: Option<String>,
    pub hostname: Option<String>,
    pub model: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_name: Option<String>,
}

impl HostInfo {
    pub fn collect() -> Self {
        let uname = read_uname();
        HostInfo {
            architecture: uname.as_ref().map(|u| u.machine.clone()),
            hostname: System::host_name(),
            model: read_model_name(),
            os_name: System::name(),
            os_version: System::os_version(),
            kernel_name: uname.map(|u| u.sysname),
        }
    }

    pub fn display_architecture(&self) -> String {
        or_unknown(&self.architecture, "Unknown architecture")
    }

    pub fn display_hostname(&self) -> String {
        or_unknown(&self.hostname, "Unknown hostname")
    }

    pub fn display_model(&self) -> String {
        or_unknown(&self.model, "Unknown model name")
    }

    pub fn display_os_name(&self) -> String {
        or_unknown(&self.os_name, "Unknown name for macOS")
    }

    pub fn display_os_version(&self) -> String {
        or_unknown(&self.os_version, "Unknown version of macOS")
    }

    pub fn display_kernel_name(&self) -> String {
        or_unknown(&self.kernel_name, "Unknown kernel name")
    }
}

fn or_unknown(value: &Option<String>, fallback: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

struct Uname {
    sysname: String,
    machine: String,
}

#[cfg(unix)]
fn read_uname() -> Option<Uname> {
    use std::ffi::CStr;
    use std::mem::MaybeUninit;

    let mut info = MaybeUninit::<libc::utsname>::uninit();
    if unsafe { libc::uname(info.as_mut_ptr()) } != 0 {
        log::debug!("uname failed: {}", std::io::Error::last_os_error());
        return None;
    }
    let info = unsafe { info.assume_init() };
    let field = |raw: &[libc::c_char]| unsafe {
        CStr::from_ptr(raw.as_ptr())
            .to_string_lossy()
            .trim()
            .to_string()
    };
    Some(Uname {
        sysname: field(&info.sysname[..]),
        machine: field(&info.machine[..]),
    })
}

#[cfg(not(unix))]
fn read_uname() -> Option<Uname> {
    None
}

#[cfg(target_os = "macos")]
fn read_model_name() -> Option<String> {
    use std::ffi::CString;
    use std::ptr;

    let name = CString::new("hw.model").ok()?;
    let mut len: libc::size_t = 0;
    let status = unsafe {
        libc::sysctlbyname(name.as_ptr(), ptr::null_mut(), &mut len, ptr::null_mut(), 0)
    };
    if status != 0 || len == 0 {
        return None;
    }

    let mut buf = vec![0u8; len];
    let result = unsafe {
        libc::sysctlbyname(
            name.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if result != 0 {
        log::debug!("sysctl hw.model failed: {}", std::io::Error::last_os_error());
        return None;
    }
    buf.truncate(len);
    let model = String::from_utf8_lossy(&buf)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    Some(model).filter(|m| !m.is_empty())
}

#[cfg(not(target_os = "macos"))]
fn read_model_name() -> Option<String> {
    const MODEL_PATHS: [&str; 2] = [
        "/sys/devices/virtual/dmi/id/product_name",
        "/proc/device-tree/model",
    ];
    MODEL_PATHS.iter().find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .map(|raw| raw.trim_end_matches('\0').trim().to_string())
            .filter(|model| !model.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let info = HostInfo {
            hostname: Some(String::new()),
            ..HostInfo::default()
        };
        assert_eq!(info.display_architecture(), "Unknown architecture");
        assert_eq!(info.display_hostname(), "Unknown hostname");
        assert_eq!(info.display_model(), "Unknown model name");
        assert_eq!(info.display_kernel_name(), "Unknown kernel name");
    }

    #[cfg(unix)]
    #[test]
    fn uname_reports_kernel_and_machine() {
        let info = HostInfo::collect();
        assert!(!info.display_kernel_name().is_empty());
        assert!(info.kernel_name.is_some());
        assert!(info.architecture.is_some());
    }
}
