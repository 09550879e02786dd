#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-analyzer** – URL Analyzer Worker for the collaborative outline
//! engine (spec §4.7).
//!
//! Runs entirely outside the Container Serializer's critical section: the
//! kernel enqueues a rescan via [`AnalyzerWorker`]'s
//! [`AnalyzerTrigger`](outline_kernel::AnalyzerTrigger) implementation,
//! and a bounded pool of background tasks tokenizes content, extracts
//! `http`/`https` URLs, fetches best-effort metadata for each, and commits
//! a `UrlsAnalyzed` event through the same [`NodeStore`](outline_store_core::NodeStore)
//! and [`EventBus`](outline_bus_core::EventBus) the kernel uses.

mod config;
mod error;
mod extract;
mod fetch;
mod job;
mod worker;

pub use config::AnalyzerConfig;
pub use error::AnalyzerError;
pub use extract::{extract_urls, UrlSpan};
pub use job::ContentJob;
pub use worker::AnalyzerWorker;
