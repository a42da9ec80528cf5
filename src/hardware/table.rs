//! Minimum NVIDIA driver versions per CUDA toolkit release.
//!
//! Source: table 3 of the CUDA toolkit release notes. Linux and Windows ship
//! different driver branches, so each host OS has its own column.

/// Host operating systems with a compatibility table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    Windows,
    /// Any OS without NVIDIA CUDA driver support (macOS, BSDs, ...).
    Other,
}

impl HostOs {
    /// The OS this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            HostOs::Linux
        } else if cfg!(target_os = "windows") {
            HostOs::Windows
        } else {
            HostOs::Other
        }
    }
}

/// One row: CUDA `(major, minor)` and the minimum driver version string.
pub type DriverRequirement = ((u32, u32), &'static str);

const LINUX: &[DriverRequirement] = &[
    ((12, 4), "550.54.14"),
    ((12, 3), "545.23.06"),
    ((12, 2), "535.54.03"),
    ((12, 1), "530.30.02"),
    ((12, 0), "525.60.13"),
    ((11, 8), "520.61.05"),
    ((11, 7), "515.48.07"),
    ((11, 6), "510.47.03"),
    ((11, 5), "495.29.05"),
    ((11, 4), "470.82.01"),
    ((11, 3), "465.19.01"),
    ((11, 2), "460.32.03"),
    ((11, 1), "455.32"),
    ((11, 0), "450.51.06"),
    ((10, 2), "440.33"),
    ((10, 1), "418.39"),
    ((10, 0), "410.48"),
    ((9, 2), "396.26"),
    ((9, 1), "390.46"),
    ((9, 0), "384.81"),
    ((8, 0), "375.26"),
];

const WINDOWS: &[DriverRequirement] = &[
    ((12, 4), "551.61"),
    ((12, 3), "545.84"),
    ((12, 2), "536.25"),
    ((12, 1), "531.14"),
    ((12, 0), "527.41"),
    ((11, 8), "520.06"),
    ((11, 7), "516.31"),
    ((11, 6), "511.65"),
    ((11, 5), "496.13"),
    ((11, 4), "472.50"),
    ((11, 3), "465.89"),
    ((11, 2), "461.33"),
    ((11, 1), "456.81"),
    ((11, 0), "451.82"),
    ((10, 2), "441.22"),
    ((10, 1), "418.96"),
    ((10, 0), "411.31"),
    ((9, 2), "398.26"),
    ((9, 1), "391.29"),
    ((9, 0), "385.54"),
    ((8, 0), "376.51"),
];

/// The compatibility rows for `os`; empty when the OS has none.
pub fn minimum_driver_versions(os: HostOs) -> &'static [DriverRequirement] {
    match os {
        HostOs::Linux => LINUX,
        HostOs::Windows => WINDOWS,
        HostOs::Other => &[],
    }
}
