//! Ubidrive Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `CloudFile`, `FileVersion`, `FileListSnapshot`,
//!   `SyncSession`, `ConflictRecord`
//! - **Pure services** - `ChangeDetector` snapshot diffing
//! - **Port definitions** - Traits for adapters: `IDocumentStore`, `IMetadataSource`
//! - **Events** - The typed `SyncEvent` stream emitted by the orchestrator
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external I/O.
//! Ports define trait interfaces that adapter crates (or the embedding
//! application) implement. The orchestration layer in `ubidrive-sync` drives
//! domain entities through the port interfaces.

pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
