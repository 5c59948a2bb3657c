//! Image coordinates and migration metadata
//!
//! This module holds the plain data the pipeline moves around: where an
//! image lives ([`ImageReference`]), what a source repository contains
//! ([`RepositoryMetadata`]), the complete unit of work for one run
//! ([`MigrationBatch`]) and where each repository goes ([`TargetMap`]).
//!
//! Nothing here performs I/O. Values are built once by the metadata source
//! and the target resolver and are read-only afterwards.

pub mod metadata;
pub mod reference;

pub use metadata::{
    MigrationBatch, PullJob, RenamedImage, RepositoryMetadata, TargetMap, TargetRepository,
};
pub use reference::ImageReference;
