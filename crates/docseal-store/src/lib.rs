//! # DocSeal Store
//!
//! Storage abstraction for DocSeal. Provides a trait-based interface for
//! key, document, report and audit persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store module abstracts storage behind the [`Store`] trait, allowing
//! the kernel to be storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`AuditQuery`] - Filter for audit history reads
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docseal_store::{SqliteStore, Store};
//! use docseal_core::DocumentHash;
//!
//! async fn example() -> anyhow::Result<()> {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("docseal.db")?;
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory()?;
//!
//!     let hash = DocumentHash::of_content(b"transcript.pdf bytes");
//!     let document = store.get_document_by_hash(&hash).await?;
//!     assert!(document.is_none());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Unique fingerprints and hashes**: enforced by the storage layer, not by callers
//! - **Checked transitions**: status mutators re-check the transition table
//!   against the stored row inside the same operation
//! - **Atomic rotation**: the new key, the old key's ROTATED status and the
//!   rotation edge commit together
//! - **Append-only audit**: no update or delete path exists

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AuditQuery, Store};
