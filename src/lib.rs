//! # imgpipe
//!
//! Batch image processing driven by named operation sequences. A job names a
//! source image and an ordered list of steps (`rotate`, `resize`,
//! `grayscale`, `brightness`, `transform`, `details`); each step is applied in
//! turn to an in-memory raster and reports what it did.
//!
//! # Architecture
//!
//! ```text
//! BlobStore::fetch → Codec::decode → Pipeline (steps over Raster) → Codec::encode → BlobStore::store
//! ```
//!
//! A step that names an unknown operation, carries bad parameters, or fails
//! while running is recorded as a diagnostic and the sequence continues with
//! the raster it had. Only the edges are fatal: a source that cannot be
//! fetched or decoded, or a result that cannot be encoded or stored, ends the
//! job with a single error.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`raster`] | Owned pixel buffer (RGB, RGBA, GRAY8) and conversion to/from `image` |
//! | [`ops`] | Closed operation registry, parameter validation, the six handlers |
//! | [`pipeline`] | Step executor, step results, request step syntax |
//! | [`job`] | One job end to end: fetch, decode, run, encode, store, report |
//! | [`codec`] | `Codec` trait and the `image`-crate implementation |
//! | [`storage`] | `BlobStore` trait and the local-directory implementation |
//! | [`context`] | Invocation context carrying the cold-start flag |
//! | [`config`] | `imgpipe.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Borrowed Input, Owned Output
//!
//! Handlers take `&Raster` and return a new raster. The executor swaps it in
//! only after the handler succeeds, so a failing step can never leave the
//! working image half-modified.
//!
//! ## Typed Parameters After Validation
//!
//! Requests carry loose `name → value` maps. Each operation validates its map
//! exactly once into a typed struct (`RotateParams`, `ResizeParams`, ...)
//! and the handler only ever sees the typed form.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding and encoding go through the `image` crate's pure-Rust codecs, so
//! the binary has no system image libraries to install.

pub mod codec;
pub mod config;
pub mod context;
pub mod job;
pub mod ops;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod storage;
