//! URL normalization, classification, and frontier dedup
//!
//! Everything that decides whether a discovered URL should ever be fetched
//! lives here: canonicalization so equivalent forms compare equal, host
//! classification (internal vs external), and the visited-set that makes
//! admission race-free across workers.

mod domain;
mod frontier;
mod normalize;

pub use domain::{extract_domain, host_of};
pub use frontier::UrlFrontier;
pub use normalize::{normalize_url, url_hash};
