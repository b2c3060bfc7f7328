// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network and credential safety for the Ragline service.
//!
//! Provides SSRF prevention for the crawler (URL validation plus a filtering
//! DNS resolver) and secret handling for the auth layer and logs.

pub mod secrets;
pub mod ssrf;

pub use secrets::{constant_time_eq, key_preview, redact};
pub use ssrf::{SsrfSafeResolver, is_private_ip, validate_source_url};
