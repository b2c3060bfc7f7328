// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Ragline integration tests.
//!
//! Provides mock collaborators and a test harness for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockLlm`] - LLM with pre-configured responses and a call counter
//! - [`MockCrawler`] - crawler serving registered pages
//! - [`MockEmbedder`] - deterministic bag-of-words embeddings
//! - [`TestHarness`] - the full use-case graph over these mocks

pub mod harness;
pub mod mock_provider;
pub mod mock_services;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::MockLlm;
pub use mock_services::{MockCrawler, MockEmbedder};
