use gpuvm_core::types::{Target, VmId};
use serde::Serialize;

/// One row of the active GPU VM inventory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct GpuVmRow {
    pub oid: VmId,
    /// Host of the VM's last history record; empty if the VM was never placed.
    pub hostname: Option<String>,
    /// Number of attached NVIDIA (`10de`) PCI devices.
    pub nvidia_devices: u64,
}

impl GpuVmRow {
    /// Convert into a probe target, or `None` if the row has no usable host.
    pub fn into_target(self) -> Option<Target> {
        let host = self.hostname?.trim().to_string();
        if host.is_empty() {
            return None;
        }
        Some(Target::new(self.oid, host))
    }
}
