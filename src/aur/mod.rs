// src/aur/mod.rs

//! AUR repository access
//!
//! - `rpc`: request URLs and the response envelope
//! - `package`: records decoded from responses
//! - `transport`: HTTP behind a trait so tests can serve canned bodies
//! - `client`: exact lookup, search and snapshot download

mod client;
mod package;
mod rpc;
mod transport;

pub use client::{RepositoryClient, SearchResult};
pub use package::{RemotePackage, SummaryRecord, VCS_SUFFIXES, VCS_VERSION, is_vcs, printable};
pub use rpc::{RpcResponse, git_url, info_url, search_url, snapshot_url};
pub use transport::{HttpTransport, RpcTransport};
#[cfg(any(test, feature = "test-utils"))]
pub use transport::StaticTransport;

/// Shortest term the RPC accepts for a search
pub const MIN_SEARCH_LEN: usize = 4;
