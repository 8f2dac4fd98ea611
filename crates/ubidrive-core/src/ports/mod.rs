//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMetadataSource`] - Remote metadata queries, change ticks, identity
//! - [`IDocumentStore`] - Document byte operations, local and remote

pub mod document_store;
pub mod metadata_source;

pub use document_store::{DocumentState, IDocumentStore, StoreLocation};
pub use metadata_source::{IMetadataSource, MetadataFilter, RemoteItem};
