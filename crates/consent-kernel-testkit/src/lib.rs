//! # Consent Kernel Testkit
//!
//! Testing utilities for the Consent Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Parties, canned operations, and an engine over a memory
//!   store with a manual clock
//! - **Generators**: Proptest strategies for records, calls, and raw
//!   host arguments
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use consent_kernel_testkit::fixtures::{Parties, EPOCH};
//! use consent_kernel_testkit::generators::{operation, record};
//!
//! proptest! {
//!     #[test]
//!     fn update_keeps_status(
//!         record in record(Parties::new()),
//!         op in operation(Parties::new(), EPOCH),
//!     ) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use consent_kernel_testkit::fixtures::TestFixture;
//!
//! # async fn example() -> consent_kernel::Result<()> {
//! let fixture = TestFixture::new();
//! let instance = fixture.pending().await?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{Parties, TestFixture, EPOCH, THIRTY_DAYS};
