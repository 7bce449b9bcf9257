//! # Paramlink Discovery
//!
//! Finds parameter files that could belong to a template.
//!
//! ## Pipeline
//!
//! ```text
//! Template folder (non-recursive)
//!     │
//!     ├──> Content Sniffer (bounded byte budget)
//!     │      └─> Parameters documents
//!     │
//!     └──> Name Heuristic Matcher (stem prefix)
//!            └─> Candidates flagged as close name matches
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use paramlink_discovery::CandidateFinder;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let finder = CandidateFinder::default();
//!     for candidate in finder.find_candidates(Path::new("/infra/web.json")).await {
//!         println!("{} close={}", candidate.path.display(), candidate.is_close_name_match);
//!     }
//! }
//! ```

mod error;
mod finder;
mod limits;
mod name_match;
mod sniffer;

pub use error::{DiscoveryError, Result};
pub use finder::CandidateFinder;
pub use limits::{SniffOptions, DEFAULT_SNIFF_MAX_BYTES, SNIFF_CHUNK_BYTES};
pub use name_match::{is_likely_match, stem_without_extensions};
pub use sniffer::{
    is_recognized_schema, ContentSniffer, SniffOutcome, RECOGNIZED_SCHEMA_URIS, SCHEMA_MARKER,
};
