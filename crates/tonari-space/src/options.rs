//! Search options: cancellation, filtering, and search-shaping knobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation token.
///
/// Search workers poll the token between expansions; once cancelled, a
/// search winds down and returns the best results found so far. Tokens are
/// cheap to clone and all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Predicate deciding whether a point may appear in search results.
pub type PointFilter<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// Options for nearest-neighbour searches. All fields have usable defaults.
///
/// Rejected points never enter the result set, but their neighbourhoods are
/// still explored: the filter shapes the results, not the traversal.
#[derive(Clone)]
pub struct SearchOptions<P> {
    /// Token that can abort the search. Default: never cancelled.
    pub cancellation: Cancellation,

    /// Admission predicate for result points. Default: admit all.
    pub filter: Option<PointFilter<P>>,

    /// Frontier widening factor. Once `k` results are held, frontier
    /// entries farther than `epsilon * worst_result` are not expanded.
    /// Values above 1 trade extra work for recall. Default: 1.1.
    pub epsilon: f64,

    /// Number of distinct random entry points used to seed the search.
    /// Default: 10.
    pub seeds: usize,
}

impl<P> SearchOptions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// True if the filter admits `pt` (or no filter is set).
    pub fn admits(&self, pt: &P) -> bool {
        self.filter.as_ref().map_or(true, |f| f(pt))
    }
}

impl<P> Default for SearchOptions<P> {
    fn default() -> Self {
        Self {
            cancellation: Cancellation::new(),
            filter: None,
            epsilon: 1.1,
            seeds: 10,
        }
    }
}

impl<P> std::fmt::Debug for SearchOptions<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOptions")
            .field("cancellation", &self.cancellation)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("epsilon", &self.epsilon)
            .field("seeds", &self.seeds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_shared_across_clones() {
        let token = Cancellation::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_default_options_admit_everything() {
        let options: SearchOptions<i32> = SearchOptions::default();
        assert!(options.admits(&42));
        assert!(!options.cancellation.is_cancelled());
        assert_eq!(options.epsilon, 1.1);
        assert_eq!(options.seeds, 10);
    }

    #[test]
    fn test_filter() {
        let options = SearchOptions::<i32>::new().with_filter(|v| v % 2 == 0);
        assert!(options.admits(&4));
        assert!(!options.admits(&5));
    }
}
