//! # precedent-core
//!
//! An async legal case-law retrieval pipeline for Indian judgments. A
//! caller submits a natural-language query describing a legal
//! proposition; the pipeline extracts intent, synthesises query
//! variants across a deterministic planner and an optional LLM
//! reasoner, retrieves candidates from multiple providers concurrently,
//! verifies and classifies them, and gates the result through a
//! proposition graph before scoring and diversifying.
//!
//! ## Core stages
//!
//! - [`intent`]: raw query → [`domain::CanonicalIntent`]'s input, [`intent::IntentProfile`]
//! - [`planner`]: deterministic query variants + keyword pack
//! - [`reasoner`]: optional LLM sketch/plan, circuit-breaker guarded
//! - [`canonical`]: merges intent + reasoner plan, synthesises variants
//! - [`providers`]: concurrent multi-provider retrieval
//! - [`hybrid`]: lexical/semantic fusion + rerank
//! - [`verifier`]: bounded-concurrency detail hydration
//! - [`gate`]: proposition evaluation, strict/provisional/near-miss split
//! - [`scorer`]: confidence scoring and diversification
//! - [`pipeline`]: end-to-end orchestration and response assembly
//!
//! ## Example
//!
//! ```rust,ignore
//! use precedent_core::pipeline::{Pipeline, Request};
//!
//! // `pipeline` is assembled from a loaded `PipelineConfig`, a `Cache`,
//! // a `ModelGateway`, the provider bank, verifier, and optional hybrid
//! // search / fallback store — see `pipeline::Pipeline::new`.
//! let request = Request {
//!     query: "section 482 quashing fir".to_string(),
//!     max_results: 20,
//!     request_id: uuid::Uuid::new_v4().to_string(),
//!     debug_enabled: false,
//! };
//! let response = pipeline.run(request).await;
//! ```

extern crate self as precedent_core;

pub mod cache;
pub mod canonical;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod hybrid;
pub mod intent;
pub mod legal;
pub mod pipeline;
pub mod planner;
pub mod providers;
pub mod reasoner;
pub mod scorer;
pub mod signature;
pub mod telemetry;
pub mod verifier;

pub use config::PipelineConfig;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Pipeline, Request, Response};
