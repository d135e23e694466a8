//! Per question-pair layout cache.
//!
//! Finished dot sets are stored under (colour column, layout column). Once a
//! key holds a value it is authoritative: it is returned as-is and never
//! recomputed until the whole cache is dropped or cleared (new import,
//! canvas resize).
//!
//! Each key owns a `OnceCell`, so at most one computation per key runs at a
//! time. A second caller for a key that is being computed blocks and then
//! receives the same `Arc`. A failed computation leaves the key empty.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;

use crate::parser::Column;
use super::Dot;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub color: String,
    pub layout: String,
}

impl PairKey {
    pub fn new(color: &str, layout: &str) -> Self {
        Self { color: color.to_string(), layout: layout.to_string() }
    }
}

type Slot = Arc<OnceCell<Arc<[Dot]>>>;

#[derive(Debug, Default)]
pub struct LayoutCache {
    entries: Mutex<HashMap<PairKey, Slot>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PairKey, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: PairKey) -> Slot {
        self.lock().entry(key).or_default().clone()
    }

    /// Stored dots for a key, without computing.
    pub fn get(&self, key: &PairKey) -> Option<Arc<[Dot]>> {
        self.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.get(key).is_some()
    }

    /// Stored dots for the pair, or the result of `compute` which is then stored.
    pub fn get_or_compute<E>(
        &self,
        color: &Column,
        layout: &Column,
        compute: impl FnOnce() -> Result<Vec<Dot>, E>,
    ) -> Result<Arc<[Dot]>, E> {
        self.get_or_compute_key(PairKey::new(&color.id, &layout.id), compute)
    }

    pub fn get_or_compute_key<E>(
        &self,
        key: PairKey,
        compute: impl FnOnce() -> Result<Vec<Dot>, E>,
    ) -> Result<Arc<[Dot]>, E> {
        // The map lock is only held to find the slot; computing happens outside it
        let slot = self.slot(key.clone());
        if let Some(dots) = slot.get() {
            tracing::debug!(color = %key.color, layout = %key.layout, "layout cache hit");
            return Ok(dots.clone());
        }
        slot.get_or_try_init(|| {
            tracing::debug!(color = %key.color, layout = %key.layout, "layout cache miss");
            compute().map(Arc::from)
        })
        .cloned()
    }

    /// Number of keys holding a finished layout.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Computations already running finish into their
    /// detached slots and are not visible afterwards.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::QuestionType;
    use indexmap::IndexMap;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn column(id: &str) -> Column {
        Column {
            id: id.to_string(),
            question_text: String::new(),
            kind: QuestionType::Single,
            choices: IndexMap::new(),
            other_choice_label: None,
        }
    }

    fn dots(n: usize) -> Vec<Dot> {
        (0..n)
            .map(|i| Dot {
                id: format!("R{}:Q1_1", i),
                resp_id: format!("R{}", i),
                layout_focus: 1,
                color_focus: Some(1),
                x: Some(i as f64),
                y: Some(1.25),
                vx: Some(0.0),
                vy: Some(0.0),
            })
            .collect()
    }

    #[test]
    fn test_compute_called_once_per_key() {
        let cache = LayoutCache::new();
        let (color, layout) = (column("Q2"), column("Q1"));
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(dots(3))
        };

        let first = cache.get_or_compute(&color, &layout, compute).unwrap();
        let second = cache.get_or_compute(&color, &layout, compute).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(&*first, &dots(3)[..]);
    }

    #[test]
    fn test_keys_are_ordered_pairs() {
        let cache = LayoutCache::new();
        let (a, b) = (column("Q1"), column("Q2"));
        cache.get_or_compute(&a, &b, || Ok::<_, Infallible>(dots(1))).unwrap();
        cache.get_or_compute(&b, &a, || Ok::<_, Infallible>(dots(2))).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&PairKey::new("Q1", "Q2")).unwrap().len(), 1);
        assert_eq!(cache.get(&PairKey::new("Q2", "Q1")).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_compute_leaves_key_empty() {
        let cache = LayoutCache::new();
        let (a, b) = (column("Q1"), column("Q2"));
        let err = cache.get_or_compute(&a, &b, || Err::<Vec<Dot>, _>("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(!cache.contains(&PairKey::new("Q1", "Q2")));
        assert!(cache.is_empty());

        let ok = cache.get_or_compute(&a, &b, || Ok::<_, &str>(dots(2))).unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn test_clear_forgets_entries() {
        let cache = LayoutCache::new();
        let (a, b) = (column("Q1"), column("Q2"));
        cache.get_or_compute(&a, &b, || Ok::<_, Infallible>(dots(1))).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&PairKey::new("Q1", "Q2")).is_none());
    }

    #[test]
    fn test_concurrent_callers_share_one_build() {
        let cache = LayoutCache::new();
        let (color, layout) = (column("Q2"), column("Q1"));
        let calls = AtomicUsize::new(0);

        let results: Vec<Arc<[Dot]>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_compute(&color, &layout, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(50));
                                Ok::<_, Infallible>(dots(5))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for r in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], r));
        }
    }
}
