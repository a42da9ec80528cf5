//! Driver version query through `nvidia-smi`.

use anyhow::{anyhow, Context, Result};

use crate::hardware::DriverQuery;
use crate::util::process::{find_executable, ProcessBuilder};

/// Queries the installed NVIDIA driver with
/// `nvidia-smi --query-gpu=driver_version --format=csv`.
#[derive(Debug, Clone, Default)]
pub struct NvidiaSmi;

impl DriverQuery for NvidiaSmi {
    fn driver_version(&self) -> Result<String> {
        let program =
            find_executable("nvidia-smi").ok_or_else(|| anyhow!("`nvidia-smi` not found in PATH"))?;

        let output = ProcessBuilder::new(program)
            .args(["--query-gpu=driver_version", "--format=csv"])
            .exec_and_check()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        last_line(&stdout).context("`nvidia-smi` printed no driver version")
    }
}

/// The CSV output is a header followed by one row per GPU; all GPUs share
/// the driver, so the last row is enough.
fn last_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}
