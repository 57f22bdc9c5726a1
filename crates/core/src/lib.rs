//! Core building blocks for the GPU VM exporter.
//!
//! Everything in this crate is free of network and database I/O: the
//! time-bounded [`cache::MetricsCache`] shared between the collector and the
//! scrape handler, and the [`exposition`] merge engine that turns per-VM
//! exposition text into one combined document.

pub mod cache;
pub mod error;
pub mod exposition;
pub mod settings;
pub mod types;
