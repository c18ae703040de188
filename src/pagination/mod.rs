//! Pagination module
//!
//! Cursor pagination driven by the `Link` response header.
//!
//! # Overview
//!
//! `PageFetcher` turns an endpoint into a finite stream of `Page`s. The first
//! request carries the window's query parameters; every later request uses
//! the cursor URL exactly as the upstream returned it.

mod fetcher;
mod link_header;

pub use fetcher::{Page, PageFetcher};
pub use link_header::{parse_link_header, LinkHeaderPaginator};
