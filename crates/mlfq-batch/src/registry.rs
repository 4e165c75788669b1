//! Job registry.

use crate::job::{Job, JobId};

pub const DEFAULT_CAPACITY: usize = 16;
const LOAD_FACTOR_THRESHOLD: f64 = 0.8;

/// Hash table owning every job known to the scheduler, keyed by job id.
///
/// Uses separate chaining. The capacity doubles as soon as the load factor reaches 0.8.
/// Completed jobs stay in the registry until they are explicitly removed.
pub struct JobRegistry {
    buckets: Vec<Vec<Job>>,
    size: usize,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty registry with the given number of buckets (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: Self::empty_buckets(capacity.max(1)),
            size: 0,
        }
    }

    fn empty_buckets(capacity: usize) -> Vec<Vec<Job>> {
        (0..capacity).map(|_| Vec::new()).collect()
    }

    // Plain modulus. Any other function works as long as it ends with `% capacity`.
    fn hash(&self, id: JobId) -> usize {
        (id % self.buckets.len() as u64) as usize
    }

    pub fn find(&self, id: JobId) -> Option<&Job> {
        self.buckets[self.hash(id)].iter().find(|job| job.id() == id)
    }

    pub fn find_mut(&mut self, id: JobId) -> Option<&mut Job> {
        let key = self.hash(id);
        self.buckets[key].iter_mut().find(|job| job.id() == id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.find(id).is_some()
    }

    /// Returns the job with the given id, inserting a latent placeholder if it is absent.
    pub fn find_or_create_latent(&mut self, id: JobId) -> &mut Job {
        if !self.contains(id) {
            self.insert(Job::new_latent(id));
        }
        self.find_mut(id).expect("latent job was just inserted")
    }

    /// Inserts the job. The caller is responsible for id uniqueness.
    pub fn insert(&mut self, job: Job) {
        debug_assert!(!self.contains(job.id()), "job {} is already registered", job.id());
        let key = self.hash(job.id());
        self.buckets[key].push(job);
        self.size += 1;
        if self.size as f64 / self.capacity() as f64 >= LOAD_FACTOR_THRESHOLD {
            self.expand();
        }
    }

    /// Removes the job and returns it.
    ///
    /// Edges pointing to the job from other jobs are not touched.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let key = self.hash(id);
        let bucket = &mut self.buckets[key];
        let pos = bucket.iter().position(|job| job.id() == id)?;
        self.size -= 1;
        Some(bucket.swap_remove(pos))
    }

    fn expand(&mut self) {
        let capacity = self.capacity() * 2;
        let old = std::mem::replace(&mut self.buckets, Self::empty_buckets(capacity));
        for job in old.into_iter().flatten() {
            let key = self.hash(job.id());
            self.buckets[key].push(job);
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Iterates over all jobs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.buckets.iter().flatten()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
