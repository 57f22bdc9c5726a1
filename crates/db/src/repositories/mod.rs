//! Query repositories, one per logical table.

pub mod gpu_vm_repo;

pub use gpu_vm_repo::GpuVmRepo;
