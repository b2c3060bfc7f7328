// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ragline.toml` > `~/.config/ragline/ragline.toml` > `/etc/ragline/ragline.toml`
//! with environment variable overrides via `RAGLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RaglineConfig;

/// Top-level sections, used to map `RAGLINE_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &[
    "server",
    "auth",
    "openai",
    "chunking",
    "retrieval",
    "streaming",
    "resilience",
    "ingestion",
    "crawler",
    "storage",
    "logging",
    "metrics",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ragline/ragline.toml` (system-wide)
/// 3. `~/.config/ragline/ragline.toml` (user XDG config)
/// 4. `./ragline.toml` (local directory)
/// 5. `RAGLINE_*` environment variables
pub fn load_config() -> Result<RaglineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RaglineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RaglineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RaglineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RaglineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order: system, user XDG, then working directory.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/ragline/ragline.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("ragline").join("ragline.toml"));
    }
    paths.push(
        std::env::current_dir()
            .map(|d| d.join("ragline.toml"))
            .unwrap_or_else(|_| PathBuf::from("ragline.toml")),
    );
    paths
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    let files = search_paths()
        .into_iter()
        .fold(Figment::new().merge(Serialized::defaults(RaglineConfig::default())), |f, path| {
            f.merge(Toml::file(path))
        });
    files.merge(env_provider())
}

/// Maps `RAGLINE_RETRIEVAL_TOP_K` to `retrieval.top_k`.
///
/// Uses `Env::map()` rather than `Env::split("_")`, since keys like
/// `similarity_threshold` contain underscores themselves.
fn env_provider() -> Env {
    Env::prefixed("RAGLINE_").map(|key| {
        let key_str = key.as_str();
        for section in SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RAGLINE_RETRIEVAL_TOP_K", "8");
            jail.set_env("RAGLINE_RETRIEVAL_SIMILARITY_THRESHOLD", "0.4");
            jail.set_env("RAGLINE_AUTH_BEARER_TOKEN", "from-env");
            jail.set_env("RAGLINE_SERVER_PORT", "9090");
            let config: RaglineConfig = Figment::new()
                .merge(Serialized::defaults(RaglineConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.retrieval.top_k, Some(8));
            assert_eq!(config.retrieval.similarity_threshold, Some(0.4));
            assert_eq!(config.auth.bearer_token.as_deref(), Some("from-env"));
            assert_eq!(config.server.port, 9090);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ragline.toml",
                "[chunking]\nmax_tokens = 800\n[retrieval]\ntop_k = 4\n",
            )?;
            let config = load_config_from_path(Path::new("ragline.toml"))?;
            assert_eq!(config.chunking.max_tokens, 800);
            assert_eq!(config.chunking.min_tokens, 400);
            assert_eq!(config.retrieval.top_k, Some(4));
            Ok(())
        });
    }
}
