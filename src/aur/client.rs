// src/aur/client.rs

//! Repository client
//!
//! Queries the AUR RPC for exact package lookups and fuzzy searches. Exact
//! lookups can be served from the on-disk RPC cache. Transport and decoding
//! failures are reported to the operator and turned into "not found" so a
//! flaky network never aborts a multi-package run halfway.

use super::package::{RemotePackage, SummaryRecord};
use super::rpc::{self, RpcResponse};
use super::transport::RpcTransport;
use crate::cache::CacheManager;
use crate::config::SearchField;
use crate::error::{Error, Result};
use crate::localdb::LocalDatabase;
use crate::report::Reporter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Outcome of [`RepositoryClient::search`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Exact(RemotePackage),
    Summaries(Vec<SummaryRecord>),
    NotFound,
}

struct RpcCache {
    cache: Arc<CacheManager>,
    ttl: Duration,
}

/// Client for the AUR RPC service
pub struct RepositoryClient {
    transport: Arc<dyn RpcTransport>,
    localdb: Arc<dyn LocalDatabase>,
    reporter: Arc<dyn Reporter>,
    base_url: String,
    rpc_cache: Option<RpcCache>,
}

impl RepositoryClient {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        localdb: Arc<dyn LocalDatabase>,
        reporter: Arc<dyn Reporter>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            localdb,
            reporter,
            base_url: base_url.into(),
            rpc_cache: None,
        }
    }

    /// Serve exact lookups from the cache directory for up to `ttl`
    ///
    /// A zero `ttl` leaves caching off.
    pub fn with_rpc_cache(mut self, cache: Arc<CacheManager>, ttl: Duration) -> Self {
        self.rpc_cache = if ttl.is_zero() {
            None
        } else {
            Some(RpcCache { cache, ttl })
        };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    /// Look up `name` exactly, or search for it
    pub fn search(&self, name: &str, exact: bool, field: SearchField) -> Result<SearchResult> {
        if exact {
            return Ok(match self.search_exact(name)? {
                Some(pkg) => SearchResult::Exact(pkg),
                None => SearchResult::NotFound,
            });
        }

        let summaries = self.search_fuzzy(name, field)?;
        if summaries.is_empty() {
            Ok(SearchResult::NotFound)
        } else {
            Ok(SearchResult::Summaries(summaries))
        }
    }

    /// Exact lookup by name
    ///
    /// Packages provided by the sync repositories are never AUR packages, so
    /// they return `None` without touching the network.
    pub fn search_exact(&self, name: &str) -> Result<Option<RemotePackage>> {
        if self.localdb.is_repository_package(name)? {
            debug!("{} is in the sync repositories", name);
            return Ok(None);
        }

        let Some(response) = self.fetch_info(name)? else {
            return Ok(None);
        };

        let found = response
            .objects()
            .map(RemotePackage::from_result)
            .find(|pkg| pkg.name == name);
        if found.is_none() {
            debug!("no exact match for {}", name);
        }
        Ok(found)
    }

    /// Fuzzy search over `field`
    pub fn search_fuzzy(&self, term: &str, field: SearchField) -> Result<Vec<SummaryRecord>> {
        let url = rpc::search_url(&self.base_url, term, field);
        Ok(self
            .query(&url)
            .map(|response| response.objects().map(SummaryRecord::from_result).collect())
            .unwrap_or_default())
    }

    /// Full records for an exact name, for `-ii` output
    pub fn info_summaries(&self, name: &str) -> Result<Vec<SummaryRecord>> {
        let url = rpc::info_url(&self.base_url, name);
        Ok(self
            .query(&url)
            .map(|response| {
                response
                    .objects()
                    .map(SummaryRecord::from_result)
                    .filter(|s| s.name == name)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Download the snapshot archive of `pkg` to `dest`
    pub fn download_snapshot(&self, pkg: &RemotePackage, dest: &Path) -> Result<()> {
        if pkg.url_path.is_empty() {
            return Err(Error::DownloadError(format!(
                "no snapshot path for {}",
                pkg.name
            )));
        }
        let url = rpc::snapshot_url(&self.base_url, &pkg.url_path);
        debug!("downloading snapshot {}", url);
        self.transport.download(&url, dest)
    }

    /// git clone URL for `pkg`
    pub fn git_url(&self, pkg: &RemotePackage) -> String {
        let base = if pkg.package_base.is_empty() {
            &pkg.name
        } else {
            &pkg.package_base
        };
        rpc::git_url(&self.base_url, base)
    }

    fn fetch_info(&self, name: &str) -> Result<Option<RpcResponse>> {
        let url = rpc::info_url(&self.base_url, name);

        let Some(rpc_cache) = &self.rpc_cache else {
            return Ok(self.query(&url));
        };

        debug!("rpc cache enabled");
        let cached = {
            let _guard = rpc_cache.cache.hold()?;
            match rpc_cache.cache.read_rpc(name, rpc_cache.ttl) {
                Ok(body) => body,
                Err(e) => {
                    error!("unexpected rpc cache error: {}", e);
                    None
                }
            }
        };

        if let Some(body) = cached {
            trace!("rpc cache hit for {}", name);
            return Ok(self.decode(&url, &body));
        }

        let Some(body) = self.get(&url) else {
            return Ok(None);
        };
        let response = self.decode(&url, &body);
        if response.is_some() {
            let _guard = rpc_cache.cache.hold()?;
            if let Err(e) = rpc_cache.cache.write_rpc(name, &body) {
                error!("unable to write rpc cache: {}", e);
            }
        }
        Ok(response)
    }

    fn query(&self, url: &str) -> Option<RpcResponse> {
        let body = self.get(url)?;
        self.decode(url, &body)
    }

    fn get(&self, url: &str) -> Option<Vec<u8>> {
        debug!("{}", url);
        match self.transport.get(url) {
            Ok(body) => Some(body),
            Err(e) => {
                self.report_failure(Error::RepositoryQueryError(format!(
                    "error calling AUR search: {e}"
                )));
                None
            }
        }
    }

    fn decode(&self, url: &str, body: &[u8]) -> Option<RpcResponse> {
        match RpcResponse::decode(body) {
            Ok(response) => {
                if let Some(message) = &response.error {
                    self.reporter.error(message);
                }
                Some(response)
            }
            Err(e) => {
                trace!("undecodable response from {}", url);
                self.report_failure(Error::RepositoryQueryError(format!(
                    "unable to parse response: {e}"
                )));
                None
            }
        }
    }

    fn report_failure(&self, err: Error) {
        error!("{}", err);
        self.reporter.error(&err.to_string());
    }
}
