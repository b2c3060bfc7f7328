// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential comparison, log-safe key previews, and secret redaction.

use std::sync::LazyLock;

use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Domain separator for credential comparison MACs.
const COMPARE_KEY: &[u8] = b"ragline.credential-compare.v1";

/// Compares two credentials without short-circuiting on the first differing byte.
///
/// Both sides are MACed and the tags checked with `verify_slice`, which is
/// constant-time, so neither content nor length leaks through timing.
pub fn constant_time_eq(presented: &str, expected: &str) -> bool {
    let Ok(mut expected_mac) = HmacSha256::new_from_slice(COMPARE_KEY) else {
        return false;
    };
    expected_mac.update(expected.as_bytes());
    let tag = expected_mac.finalize().into_bytes();

    let Ok(mut presented_mac) = HmacSha256::new_from_slice(COMPARE_KEY) else {
        return false;
    };
    presented_mac.update(presented.as_bytes());
    presented_mac.verify_slice(&tag).is_ok()
}

/// Log-safe fingerprint of a credential: up to 4 leading characters plus a
/// short SHA-256 prefix, e.g. `sk-l…#3f9a12c0`.
pub fn key_preview(key: &str) -> String {
    let head: String = key.chars().take(4).collect();
    let digest = Sha256::digest(key.as_bytes());
    format!("{head}…#{}", &hex::encode(digest)[..8])
}

/// Known secret formats that must never reach logs.
static REDACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // OpenAI-style keys: sk-..., sk-proj-...
        r"sk-[a-zA-Z0-9_\-]{16,}",
        // Bearer credentials in echoed headers.
        r"(?i)bearer\s+[a-zA-Z0-9._\-]{8,}",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

const REDACTED: &str = "[REDACTED]";

/// Redacts known secret formats plus any exact `known` values from `input`.
///
/// Used on upstream error bodies before they are logged or returned.
pub fn redact(input: &str, known: &[&str]) -> String {
    let mut result = input.to_string();
    for pattern in REDACTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).into_owned();
    }

    let mut known: Vec<&str> = known.iter().copied().filter(|v| !v.is_empty()).collect();
    known.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in known {
        result = result.replace(value, REDACTED);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equal_credentials_match() {
        assert!(constant_time_eq("s3cret-token", "s3cret-token"));
    }

    #[test]
    fn differing_credentials_do_not_match() {
        assert!(!constant_time_eq("s3cret-token", "s3cret-tokem"));
        assert!(!constant_time_eq("short", "s3cret-token"));
        assert!(!constant_time_eq("", "s3cret-token"));
    }

    #[test]
    fn preview_never_contains_full_key() {
        let key = "sk-live-0123456789abcdef";
        let preview = key_preview(key);
        assert!(preview.starts_with("sk-l"));
        assert!(!preview.contains("0123456789"));
        assert_eq!(preview, key_preview(key), "preview must be stable");
        assert_ne!(preview, key_preview("sk-live-0123456789abcdeg"));
    }

    #[test]
    fn preview_handles_multibyte_keys() {
        let preview = key_preview("鍵鍵鍵鍵鍵鍵");
        assert!(preview.starts_with("鍵鍵鍵鍵…#"));
    }

    #[test]
    fn redacts_openai_keys_and_bearer_tokens() {
        let input = "upstream said: invalid key sk-proj-abcdefghijklmnop1234; header Bearer eyJhbGciOiJIUzI1";
        let out = redact(input, &[]);
        assert!(!out.contains("sk-proj-abcdef"));
        assert!(!out.contains("eyJhbGci"));
        assert_eq!(out.matches(REDACTED).count(), 2);
    }

    #[test]
    fn redacts_known_values_longest_first() {
        let out = redact("prefix short-longer suffix", &["short", "short-longer"]);
        assert_eq!(out, "prefix [REDACTED] suffix");
    }

    #[test]
    fn leaves_plain_text_alone() {
        let input = "crawl of https://example.com failed with 404";
        assert_eq!(redact(input, &[]), input);
    }

    proptest! {
        #[test]
        fn compare_agrees_with_equality(a in ".{0,32}", b in ".{0,32}") {
            prop_assert_eq!(constant_time_eq(&a, &b), a == b);
        }
    }
}
