//! # DocSeal Testkit
//!
//! Testing utilities for DocSeal.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Key material**: RSA and EC signing keys that sign document hashes the
//!   way issuing institutions do
//! - **Fixtures**: a [`ScenarioFixture`] with a kernel over an in-memory
//!   store, a manual clock and a recording audit sink
//! - **Generators**: Proptest strategies for hashes, statuses and sweeps
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use docseal_testkit::{KeyMaterial, ScenarioFixture};
//! use docseal::{ClientInfo, VerificationOutcome};
//!
//! async fn example() {
//!     let fixture = ScenarioFixture::new().await;
//!     let material = KeyMaterial::p256();
//!     let key = fixture.register(&material).await;
//!     let doc = fixture.issue(&material, &key, b"diploma").await;
//!
//!     let result = fixture
//!         .kernel
//!         .verify(doc.document_hash.as_str(), &ClientInfo::default())
//!         .await
//!         .unwrap();
//!     assert_eq!(result.outcome, VerificationOutcome::Authentic);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use docseal_testkit::generators::sloppy_hash;
//!
//! proptest! {
//!     #[test]
//!     fn hashes_normalise((typed, canonical) in sloppy_hash()) {
//!         prop_assert_eq!(DocumentHash::parse(&typed).unwrap().as_str(), canonical);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    tamper, FailingRenderer, KeyMaterial, RecordingAuditSink, ScenarioFixture, DAY_MS, EPOCH,
};
