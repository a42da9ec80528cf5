//! Hardware detection.
//!
//! Maps the installed accelerator driver to the computation backends it can
//! run. Detection never fails: without a usable driver the result is `{cpu}`.

pub mod nvidia;
pub mod table;

use std::cmp::Ordering;

use anyhow::Result;
use thiserror::Error;

use crate::core::{BackendSet, ComputationBackend, PackageVersion};

pub use nvidia::NvidiaSmi;
pub use table::HostOs;

/// Reports the installed driver version as a raw string.
pub trait DriverQuery {
    fn driver_version(&self) -> Result<String>;
}

/// Why detection fell back to CPU. Logged, never returned.
#[derive(Debug, Error)]
enum DetectionUnavailable {
    #[error("driver query failed: {0:#}")]
    Query(anyhow::Error),

    #[error("unparsable driver version `{0}`")]
    Version(String),

    #[error("no driver compatibility table for {0:?}")]
    UnsupportedOs(HostOs),
}

/// Detect the backends usable on this host with `nvidia-smi`.
pub fn detect_compatible_backends() -> BackendSet {
    detect_with(&NvidiaSmi, HostOs::current())
}

/// Detect the backends usable with the driver reported by `query` on `os`.
///
/// CPU is always included.
pub fn detect_with(query: &dyn DriverQuery, os: HostOs) -> BackendSet {
    let mut backends = BackendSet::cpu_only();

    match compatible_cuda(query, os) {
        Ok(cuda) => {
            for backend in cuda {
                backends.insert(backend);
            }
        }
        Err(reason) => tracing::debug!("accelerator detection unavailable: {}", reason),
    }

    tracing::debug!("detected computation backends: {}", backends);
    backends
}

fn compatible_cuda(
    query: &dyn DriverQuery,
    os: HostOs,
) -> Result<Vec<ComputationBackend>, DetectionUnavailable> {
    let table = table::minimum_driver_versions(os);
    if table.is_empty() {
        return Err(DetectionUnavailable::UnsupportedOs(os));
    }

    let raw = query.driver_version().map_err(DetectionUnavailable::Query)?;
    let driver: PackageVersion = raw
        .trim()
        .parse()
        .map_err(|_| DetectionUnavailable::Version(raw.clone()))?;

    Ok(table
        .iter()
        .filter_map(|&((major, minor), minimum)| {
            let minimum: PackageVersion = minimum.parse().ok()?;
            (driver.cmp_public(&minimum) != Ordering::Less)
                .then(|| ComputationBackend::cuda(major, minor))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockDriver;

    fn cuda_backends(set: &BackendSet) -> Vec<String> {
        set.iter()
            .filter(|b| !b.is_cpu())
            .map(|b| b.to_string())
            .collect()
    }

    #[test]
    fn test_no_driver_is_cpu_only() {
        let set = detect_with(&MockDriver::missing(), HostOs::Linux);
        assert_eq!(set, BackendSet::cpu_only());
    }

    #[test]
    fn test_unparsable_driver_is_cpu_only() {
        let set = detect_with(&MockDriver::new("driver_version"), HostOs::Linux);
        assert_eq!(set, BackendSet::cpu_only());
    }

    #[test]
    fn test_unsupported_os_is_cpu_only() {
        let set = detect_with(&MockDriver::new("550.54.14"), HostOs::Other);
        assert_eq!(set, BackendSet::cpu_only());
    }

    #[test]
    fn test_latest_driver_supports_everything() {
        for os in [HostOs::Linux, HostOs::Windows] {
            let rows = table::minimum_driver_versions(os);
            let set = detect_with(&MockDriver::new(rows[0].1), os);
            assert_eq!(set.len(), rows.len() + 1);
            assert!(set.contains(&ComputationBackend::Cpu));
        }
    }

    #[test]
    fn test_outdated_driver_supports_nothing() {
        let set = detect_with(&MockDriver::new("300"), HostOs::Linux);
        assert_eq!(set, BackendSet::cpu_only());
    }

    #[test]
    fn test_normal_driver() {
        let set = detect_with(&MockDriver::new("450.80.02"), HostOs::Linux);
        assert_eq!(
            cuda_backends(&set),
            vec!["cu80", "cu90", "cu91", "cu92", "cu100", "cu101", "cu102", "cu110"]
        );

        let set = detect_with(&MockDriver::new("441.22"), HostOs::Windows);
        assert_eq!(cuda_backends(&set).last().map(String::as_str), Some("cu102"));
    }

    #[test]
    fn test_detection_is_monotonic() {
        let drivers = ["375.26", "410.48", "455.32", "455.40", "520.61.05", "600"];
        let mut previous = BackendSet::cpu_only();
        for driver in drivers {
            let set = detect_with(&MockDriver::new(driver), HostOs::Linux);
            for backend in &previous {
                assert!(set.contains(backend), "{} dropped at {}", backend, driver);
            }
            previous = set;
        }
    }
}
