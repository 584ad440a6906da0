//! Client for the generative video service.
//!
//! Provides the [`GenerationApi`] seam, an HTTP implementation for the Luma
//! generations API, and [`JobRunner`], which takes one request through
//! submit, poll and download with bounded retries.

pub mod api;
pub mod client;
pub mod error;
pub mod runner;
pub mod types;

pub use api::GenerationApi;
pub use client::{LumaClient, LumaClientConfig};
pub use error::{GenResult, GenerationError};
pub use runner::{GenerationPolicy, JobReport, JobRunner};
pub use types::JobStatus;
