//! Build artifact spec, Dockerfile rendering, and build context bundling.
//!
//! # Assembly pipeline
//!
//! ```text
//! dockyard assemble
//!   1. Dirty check  ── git status --porcelain (skip with --allow-dirty)
//!   2. Spec         ── ArtifactSpec::from_config() + validate()
//!   3. Dockerfile   ── DockerfileGenerator::render()
//!   4. Bundle       ── git ls-files → .dockyard-bundle/
//!   5. Stages       ── docker build --target <stage>, in order;
//!                      only the runtime stage is tagged
//! ```
//!
//! # Stage isolation
//!
//! The build stage installs the toolchain and resolves the package manifest
//! into a user-local bundle directory. The runtime stage starts from a
//! fresh base and may copy only what a build stage's resolution step
//! produced; [`ArtifactSpec::validate`] rejects anything else before a
//! single stage runs.

pub mod bundle;
pub mod dockerfile;
pub mod spec;

pub use dockerfile::DockerfileGenerator;
pub use spec::{ArtifactSpec, SpecError};
