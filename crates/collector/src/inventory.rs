//! Source of the GPU VMs to probe each cycle.

use async_trait::async_trait;
use gpuvm_core::types::Target;
use gpuvm_db::repositories::GpuVmRepo;
use gpuvm_db::DbPool;

use crate::error::InventoryError;

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Every active VM with at least one attached GPU.
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError>;

    /// Cheap reachability check used by the health endpoint.
    async fn ping(&self) -> Result<(), InventoryError>;
}

/// Inventory backed by the OpenNebula MySQL database.
pub struct DbInventory {
    pool: DbPool,
}

impl DbInventory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Inventory for DbInventory {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError> {
        Ok(GpuVmRepo::list_targets(&self.pool).await?)
    }

    async fn ping(&self) -> Result<(), InventoryError> {
        Ok(gpuvm_db::health_check(&self.pool).await?)
    }
}
