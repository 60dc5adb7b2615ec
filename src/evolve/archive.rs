//! Bounded solution archive with ring-buffer eviction.
//!
//! The archive keeps copies of notable solutions (typically elites) in a
//! fixed-capacity ring: once full, each insertion overwrites the oldest
//! entry. It is the only core structure mutated from multiple call sites, so
//! access goes through reader/writer guards: any number of readers may
//! overlap, writers are exclusive.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::ga::{Chromosome, EvolveError, Fitness, Objective};

/// Re-scoring function applied to every inserted chromosome.
pub type ArchiveFitnessFn<G> = dyn Fn(&G) -> Fitness + Send + Sync;

/// Fixed-capacity ring buffer of chromosomes.
pub struct Archive<G> {
    ring: RwLock<Ring<G>>,
    fitness: Option<Box<ArchiveFitnessFn<G>>>,
}

struct Ring<G> {
    capacity: usize,
    /// Stored items; grows up to `capacity`, then slots are reused.
    slots: Vec<Chromosome<G>>,
    /// Next write position.
    pointer: usize,
}

impl<G> Ring<G> {
    /// Physical slot of a logical index (0 = oldest stored item).
    fn physical(&self, logical: usize) -> usize {
        if self.slots.len() < self.capacity {
            logical
        } else {
            (self.pointer + logical) % self.capacity
        }
    }
}

impl<G: Clone> Archive<G> {
    /// Create an archive with the given capacity and an optional fitness
    /// function used to re-score chromosomes on insertion.
    ///
    /// The archive may hold a solution beyond the lifetime of the context in
    /// which it was first scored, so insertion refreshes the cached fitness
    /// whenever a function is configured.
    pub fn create(
        capacity: usize,
        fitness: Option<Box<ArchiveFitnessFn<G>>>,
    ) -> Result<Self, EvolveError> {
        if capacity == 0 {
            return Err(EvolveError::ZeroCapacity);
        }
        Ok(Self {
            ring: RwLock::new(Ring {
                capacity,
                slots: Vec::with_capacity(capacity),
                pointer: 0,
            }),
            fitness,
        })
    }

    /// Enter the read section; blocks while a writer holds the archive.
    pub fn read(&self) -> ArchiveReadGuard<'_, G> {
        ArchiveReadGuard {
            ring: self.ring.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Enter the write section; blocks until exclusive access is obtained.
    pub fn write(&self) -> ArchiveWriteGuard<'_, G> {
        ArchiveWriteGuard {
            ring: self.ring.write().unwrap_or_else(PoisonError::into_inner),
            fitness: self.fitness.as_deref(),
        }
    }

    /// Maximum number of stored items.
    pub fn capacity(&self) -> usize {
        self.read().ring.capacity
    }
}

/// Shared view of the archive; held while reading.
pub struct ArchiveReadGuard<'a, G> {
    ring: RwLockReadGuard<'a, Ring<G>>,
}

impl<G> ArchiveReadGuard<'_, G> {
    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.ring.slots.len()
    }

    /// Check whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.ring.slots.is_empty()
    }

    /// Item at the given logical index, 0 being the oldest stored.
    pub fn get(&self, logical: usize) -> &Chromosome<G> {
        assert!(
            logical < self.len(),
            "archive index {logical} out of range ({} stored)",
            self.len()
        );
        &self.ring.slots[self.ring.physical(logical)]
    }

    /// Iterate stored items oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Chromosome<G>> {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Best stored fitness under the given objective, if any.
    pub fn best_fitness(&self, objective: Objective) -> Option<Fitness> {
        self.iter()
            .map(|chr| chr.fitness)
            .reduce(|best, f| if objective.better(f, best) { f } else { best })
    }
}

/// Exclusive view of the archive; held while writing.
pub struct ArchiveWriteGuard<'a, G> {
    ring: RwLockWriteGuard<'a, Ring<G>>,
    fitness: Option<&'a ArchiveFitnessFn<G>>,
}

impl<G: Clone> ArchiveWriteGuard<'_, G> {
    /// Copy a chromosome into the slot at the write pointer, re-scoring it
    /// if a fitness function is configured, and return the stored copy.
    pub fn insert(&mut self, chr: &Chromosome<G>) -> &Chromosome<G> {
        let mut copy = chr.clone();
        if let Some(score) = self.fitness {
            copy.fitness = score(&copy.genome);
            copy.has_fitness = true;
        }

        let ring = &mut *self.ring;
        let slot = if ring.slots.len() < ring.capacity {
            ring.slots.push(copy);
            ring.slots.len() - 1
        } else {
            ring.slots[ring.pointer] = copy;
            ring.pointer
        };
        ring.pointer = (slot + 1) % ring.capacity;
        &self.ring.slots[slot]
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.ring.slots.len()
    }

    /// Check whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.ring.slots.is_empty()
    }
}
