//! Test tooling for tonari: deterministic space generators and a recall
//! harness.
//!
//! Everything here is seeded, so test failures reproduce byte for byte.
//!
//! # Example
//!
//! ```
//! use tonari_testkit::{recall_at_k, uniform_space};
//! use tonari_space::{BruteForceIndex, MetricSpace};
//! use std::sync::Arc;
//!
//! let space = Arc::new(uniform_space(200, 8, 42));
//! let oracle = BruteForceIndex::new(space.clone());
//!
//! let queries: Vec<_> = (0..10).map(|i| space.at(i * 7)).collect();
//! // The oracle trivially recalls itself perfectly.
//! let recall = recall_at_k(&oracle, &oracle, &queries, 5).unwrap();
//! assert_eq!(recall, 1.0);
//! ```

mod generators;
mod recall;

pub use generators::{clustered_space, uniform_points, uniform_space};
pub use recall::recall_at_k;
