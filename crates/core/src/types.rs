use serde::Serialize;

/// OpenNebula VM object ids are `INTEGER` primary keys.
pub type VmId = i64;

/// All wall-clock timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A GPU-bearing VM together with the physical host it currently runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub vm_id: VmId,
    /// Hostname of the hypervisor node, as recorded in the VM's last
    /// history record.
    pub host: String,
}

impl Target {
    pub fn new(vm_id: VmId, host: impl Into<String>) -> Self {
        Self {
            vm_id,
            host: host.into(),
        }
    }
}
