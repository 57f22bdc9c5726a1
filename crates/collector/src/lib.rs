//! Periodic collection of per-VM GPU exposition text.
//!
//! Each cycle asks the [`inventory::Inventory`] for GPU VMs, probes every
//! VM's host through a [`remote::RemoteExecutor`] with bounded concurrency,
//! and stores successful readings in the shared
//! [`MetricsCache`](gpuvm_core::cache::MetricsCache). Failures are isolated
//! per VM and only logged.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod inventory;
pub mod probe;
pub mod remote;
pub mod ssh;
