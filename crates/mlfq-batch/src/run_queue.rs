//! FIFO queue of job ids.

use crate::error::{SchedError, SchedResult};
use crate::job::JobId;

#[derive(Clone, Debug)]
struct Node {
    job: JobId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// FIFO queue with removal of arbitrary elements.
///
/// Implemented as a doubly linked list whose nodes live in a slab, so `push`, `pop` and `front` are O(1) and
/// `force_pop` is O(n) without moving the remaining elements. The queue does not own jobs, it only stores their ids.
///
/// Invariant: `head.is_none() == tail.is_none() == (len == 0)`.
#[derive(Clone, Debug, Default)]
pub struct RunQueue {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Appends the job to the tail. Duplicates are not checked.
    pub fn push(&mut self, job: JobId) {
        let idx = self.alloc(Node {
            job,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    /// Removes the job at the head and returns it.
    pub fn pop(&mut self) -> SchedResult<JobId> {
        let head = self.head.ok_or(SchedError::EmptyQueue)?;
        Ok(self.unlink(head))
    }

    /// Returns the job at the head without removing it.
    pub fn front(&self) -> SchedResult<JobId> {
        self.head.map(|idx| self.nodes[idx].job).ok_or(SchedError::EmptyQueue)
    }

    /// Removes the job with the given id from any position.
    ///
    /// Returns `false` and leaves the queue intact if there is no such job.
    pub fn force_pop(&mut self, job: JobId) -> bool {
        let mut cur = self.head;
        while let Some(idx) = cur {
            if self.nodes[idx].job == job {
                self.unlink(idx);
                return true;
            }
            cur = self.nodes[idx].next;
        }
        false
    }

    fn unlink(&mut self, idx: usize) -> JobId {
        let Node { job, prev, next } = self.nodes[idx].clone();
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(idx);
        self.len -= 1;
        job
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.iter().any(|id| id == job)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Iterates from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            cur: self.head,
        }
    }
}

pub struct Iter<'a> {
    queue: &'a RunQueue,
    cur: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = JobId;

    fn next(&mut self) -> Option<JobId> {
        let node = &self.queue.nodes[self.cur?];
        self.cur = node.next;
        Some(node.job)
    }
}
