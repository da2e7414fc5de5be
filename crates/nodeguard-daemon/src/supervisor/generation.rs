use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic daemon generation. Every launch advances it; tasks spawned for a
/// launch carry a token and drop their results once the counter moves on.
#[derive(Clone, Debug, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> GenerationToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationToken {
            generation,
            current: self.current.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct GenerationToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

#[cfg(test)]
impl GenerationCounter {
    pub(crate) fn current_token(&self) -> GenerationToken {
        GenerationToken {
            generation: self.current(),
            current: self.current.clone(),
        }
    }
}
