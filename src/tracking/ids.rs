use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Collision-resistant id source for new records
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic ids (`<prefix>-1`, `<prefix>-2`, ...) for reproducible fixtures.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_ids_are_distinct() {
        let ids: HashSet<_> = (0..100).map(|_| UuidGenerator.next_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("med");
        assert_eq!(ids.next_id(), "med-1");
        assert_eq!(ids.next_id(), "med-2");
    }
}
