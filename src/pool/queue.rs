use core::cmp::Ordering;

/// Comparator selecting heap mode for a pool.
///
/// `Ordering::Greater` means the first argument is dequeued before the
/// second. Ties are broken in no particular order.
pub type Priority<T> = fn(&T, &T) -> Ordering;

/// Capacity an unbounded queue starts from.
const INITIAL_CAPACITY: usize = 64;
/// Growth ceiling; a push past this fails rather than doubling again.
const MAX_CAPACITY: usize = isize::MAX as usize / 2;

/// The two queue disciplines a pool can run, fixed at construction.
pub(crate) enum TaskQueue<T> {
    Fifo(FifoRing<T>),
    Heap(PriorityHeap<T>),
}

impl<T> TaskQueue<T> {
    pub(crate) fn new(limit: Option<usize>, priority: Option<Priority<T>>) -> Self {
        let capacity = limit.map_or(INITIAL_CAPACITY, usize::next_power_of_two);
        match priority {
            Some(cmp) => Self::Heap(PriorityHeap::with_capacity(capacity, cmp)),
            None => Self::Fifo(FifoRing::with_capacity(capacity)),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Fifo(ring) => ring.len,
            Self::Heap(heap) => heap.buf.len(),
        }
    }

    /// Enqueues a task, growing the backing storage if needed.
    /// Hands the task back when growth is refused.
    pub(crate) fn push(&mut self, task: T) -> Result<(), T> {
        match self {
            Self::Fifo(ring) => ring.push(task),
            Self::Heap(heap) => heap.push(task),
        }
    }

    /// Dequeues the head in FIFO mode, the maximum in heap mode.
    pub(crate) fn pop(&mut self) -> Option<T> {
        match self {
            Self::Fifo(ring) => ring.pop(),
            Self::Heap(heap) => heap.pop(),
        }
    }
}

/// Power-of-two ring buffer, indexed with `(head + i) & mask`.
pub(crate) struct FifoRing<T> {
    buf: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> FifoRing<T> {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            buf: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, task: T) -> Result<(), T> {
        if self.len == self.buf.len() && !self.grow() {
            return Err(task);
        }
        let mask = self.buf.len() - 1;
        self.buf[(self.head + self.len) & mask] = Some(task);
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let task = self.buf[self.head].take();
        self.head = (self.head + 1) & (self.buf.len() - 1);
        self.len -= 1;
        task
    }

    /// Doubles the ring, re-linearising occupied slots from `head` so the
    /// wrap seam cannot swallow an entry.
    fn grow(&mut self) -> bool {
        let old_capacity = self.buf.len();
        let Some(new_capacity) = old_capacity
            .checked_mul(2)
            .filter(|&capacity| capacity <= MAX_CAPACITY)
        else {
            return false;
        };

        let mut next: Box<[Option<T>]> = (0..new_capacity).map(|_| None).collect();
        let mask = old_capacity - 1;
        for (index, slot) in next.iter_mut().take(self.len).enumerate() {
            *slot = self.buf[(self.head + index) & mask].take();
        }
        self.buf = next;
        self.head = 0;
        true
    }
}

/// Array-backed binary max-heap ordered by a caller comparator.
pub(crate) struct PriorityHeap<T> {
    buf: Vec<T>,
    cmp: Priority<T>,
}

impl<T> PriorityHeap<T> {
    fn with_capacity(capacity: usize, cmp: Priority<T>) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            cmp,
        }
    }

    fn push(&mut self, task: T) -> Result<(), T> {
        if self.buf.len() == self.buf.capacity() {
            let Some(new_capacity) = self
                .buf
                .capacity()
                .max(1)
                .checked_mul(2)
                .filter(|&capacity| capacity <= MAX_CAPACITY)
            else {
                return Err(task);
            };
            self.buf.reserve_exact(new_capacity - self.buf.len());
        }
        self.buf.push(task);
        self.sift_up(self.buf.len() - 1);
        Ok(())
    }

    /// Classic extract-max: move the last element to the root, sift down.
    fn pop(&mut self) -> Option<T> {
        if self.buf.is_empty() {
            return None;
        }
        let top = self.buf.swap_remove(0);
        if !self.buf.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    fn sift_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if (self.cmp)(&self.buf[child], &self.buf[parent]) != Ordering::Greater {
                break;
            }
            self.buf.swap(child, parent);
            child = parent;
        }
    }

    fn sift_down(&mut self, mut parent: usize) {
        loop {
            let left = 2 * parent + 1;
            if left >= self.buf.len() {
                break;
            }
            let mut largest = parent;
            if (self.cmp)(&self.buf[left], &self.buf[largest]) == Ordering::Greater {
                largest = left;
            }
            let right = left + 1;
            if right < self.buf.len()
                && (self.cmp)(&self.buf[right], &self.buf[largest]) == Ordering::Greater
            {
                largest = right;
            }
            if largest == parent {
                break;
            }
            self.buf.swap(parent, largest);
            parent = largest;
        }
    }
}
