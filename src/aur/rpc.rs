// src/aur/rpc.rs

//! RPC v5 request URLs and response envelope

use crate::config::SearchField;
use crate::error::Result;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Response envelope shared by `info` and `search`
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub results: Vec<Value>,
}

impl RpcResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Result entries that are JSON objects
    pub fn objects(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.results.iter().filter_map(|r| r.as_object())
    }
}

fn rpc_root(base_url: &str) -> String {
    format!("{}/rpc/?v=5", base_url.trim_end_matches('/'))
}

/// Exact lookup by name
pub fn info_url(base_url: &str, name: &str) -> String {
    format!(
        "{}&type=info&arg[]={}",
        rpc_root(base_url),
        urlencoding::encode(name)
    )
}

/// Fuzzy search over `field`
pub fn search_url(base_url: &str, term: &str, field: SearchField) -> String {
    format!(
        "{}&type=search&by={}&arg={}",
        rpc_root(base_url),
        field.as_rpc_str(),
        urlencoding::encode(term)
    )
}

/// Snapshot tarball for a package
pub fn snapshot_url(base_url: &str, url_path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), url_path)
}

/// git clone URL for a package base
pub fn git_url(base_url: &str, package_base: &str) -> String {
    format!("{}/{}.git", base_url.trim_end_matches('/'), package_base)
}
