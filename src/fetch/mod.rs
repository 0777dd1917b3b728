// src/fetch/mod.rs
// =============================================================================
// This module is the only part of the program that talks to the network.
//
// Submodules:
// - client: One HTTP GET per page, plus the PageSource trait the worker
//   pool is written against
// =============================================================================

mod client;

pub use client::{FetchConfig, FetchError, FetchedPage, HttpFetcher, PageSource, RedirectHop};
