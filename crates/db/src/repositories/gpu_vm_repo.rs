//! Repository over OpenNebula's `vm_pool` table.

use gpuvm_core::types::Target;

use crate::models::gpu_vm::GpuVmRow;
use crate::DbPool;

/// OpenNebula `VM_STATE` for ACTIVE.
pub const VM_STATE_ACTIVE: i32 = 3;

/// PCI vendor id of NVIDIA devices.
pub const NVIDIA_PCI_VENDOR: &str = "10de";

/// Active VMs with at least one NVIDIA PCI device, and the host of their
/// most recent placement. The VM body is an XML document, hence `ExtractValue`.
const ACTIVE_GPU_VMS_QUERY: &str = "\
    SELECT oid, \
           CAST(ExtractValue(body, '//HISTORY_RECORDS/HISTORY[last()]/HOSTNAME') AS CHAR) AS hostname, \
           CAST(ExtractValue(body, 'count(//PCI[VENDOR=\"10de\"])') AS UNSIGNED) AS nvidia_devices \
    FROM vm_pool \
    WHERE state = ? \
      AND ExtractValue(body, 'count(//PCI[VENDOR=\"10de\"])') > 0";

/// Provides inventory queries for GPU VMs.
pub struct GpuVmRepo;

impl GpuVmRepo {
    /// Raw inventory rows.
    pub async fn list_active(pool: &DbPool) -> Result<Vec<GpuVmRow>, sqlx::Error> {
        sqlx::query_as::<_, GpuVmRow>(ACTIVE_GPU_VMS_QUERY)
            .bind(VM_STATE_ACTIVE)
            .fetch_all(pool)
            .await
    }

    /// Inventory rows converted to probe targets.
    ///
    /// Rows without a host are logged and skipped.
    pub async fn list_targets(pool: &DbPool) -> Result<Vec<Target>, sqlx::Error> {
        let rows = Self::list_active(pool).await?;
        let total = rows.len();

        let targets: Vec<Target> = rows
            .into_iter()
            .filter_map(|row| {
                let oid = row.oid;
                let target = row.into_target();
                if target.is_none() {
                    tracing::warn!(vm_id = oid, "GPU VM has no host in its history, skipping");
                }
                target
            })
            .collect();

        tracing::debug!(rows = total, targets = targets.len(), "Inventory query complete");
        Ok(targets)
    }
}
