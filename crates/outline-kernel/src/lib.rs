#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-kernel** – Command dispatch and per-container serialization
//! for the collaborative outline engine (spec §4.1, §4.2, §5).
//!
//! The [`Dispatcher`] is the engine's single entry point: it resolves which
//! container (or pair of containers, for cross-container moves) a
//! [`Command`](outline_types::Command) addresses, hands it to the
//! container's [`SerializerHandle`] to run exclusively against that
//! container's current state, and returns either a freshly committed
//! [`Event`](outline_types::Event) or [`Outcome::NoOp`].
//!
//! `outline-kernel` depends only on `outline-types`, `outline-bus-core`,
//! `outline-store-core` and `outline-mutator` — it never depends on a
//! concrete storage or bus driver, or on the URL analyzer worker. The
//! [`AnalyzerTrigger`] trait is the seam the analyzer crate implements, the
//! same way a storage driver implements `NodeStore`.

mod analyzer_trigger;
mod config;
mod dispatcher;
mod registry;
mod serializer;

pub use analyzer_trigger::{AnalyzerTrigger, NoopAnalyzerTrigger};
pub use config::KernelConfig;
pub use dispatcher::{Dispatcher, Outcome};
pub use registry::SerializerRegistry;
pub use serializer::SerializerHandle;
