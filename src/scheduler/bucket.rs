//! Wake bucket table: one doubly-linked list per time bucket.
//!
//! Entries live in a slot arena and link to each other by slot index, so
//! appending to a bucket and unlinking from the middle of one are both O(1).
//! Freed slots are recycled; each slot carries a generation so a [`WakeKey`]
//! handed out before the slot was reused no longer addresses anything.

/// Handle to a pending wake entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeKey {
    index: u32,
    generation: u32,
}

/// A suspended execution waiting for its wake tick.
#[derive(Debug)]
pub struct WakeEntry<T> {
    wake_tick: u64,
    owner: T,
    bucket: usize,
    prev: Option<u32>,
    next: Option<u32>,
}

impl<T> WakeEntry<T> {
    /// Tick at which the entry becomes due.
    pub fn wake_tick(&self) -> u64 {
        self.wake_tick
    }

    /// Bucket the entry is linked into.
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn owner(&self) -> &T {
        &self.owner
    }

    pub fn into_owner(self) -> T {
        self.owner
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<WakeEntry<T>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

/// Fixed number of buckets, each an intrusive list over the slot arena.
#[derive(Debug)]
pub struct WakeBucketTable<T> {
    buckets: Box<[Bucket]>,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> WakeBucketTable<T> {
    /// Create an empty table. A zero bucket count is treated as one.
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: vec![Bucket::default(); bucket_count.max(1)].into_boxed_slice(),
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of linked entries across all buckets.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of entries linked into one bucket.
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets.get(bucket).map(|b| b.len).unwrap_or(0)
    }

    /// Bucket index a wake tick maps to.
    pub fn bucket_of(&self, wake_tick: u64) -> usize {
        (wake_tick % self.buckets.len() as u64) as usize
    }

    /// Append an entry at the tail of its bucket.
    ///
    /// Gives the owner back when the arena cannot grow.
    pub fn try_push_back(&mut self, wake_tick: u64, owner: T) -> Result<WakeKey, T> {
        let bucket = self.bucket_of(wake_tick);
        let tail = self.buckets[bucket].tail;
        let entry = WakeEntry {
            wake_tick,
            owner,
            bucket,
            prev: tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let Ok(index) = u32::try_from(self.slots.len()) else {
                    return Err(entry.owner);
                };
                if self.slots.try_reserve(1).is_err() {
                    return Err(entry.owner);
                }
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);
        let key = WakeKey {
            index,
            generation: slot.generation,
        };

        match tail {
            Some(tail) => self.link_mut(tail).next = Some(index),
            None => self.buckets[bucket].head = Some(index),
        }
        self.buckets[bucket].tail = Some(index);
        self.buckets[bucket].len += 1;
        self.len += 1;

        Ok(key)
    }

    /// Look up a pending entry.
    pub fn get(&self, key: WakeKey) -> Option<&WakeEntry<T>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    /// Unlink and return a pending entry. Stale keys return `None`.
    pub fn remove(&mut self, key: WakeKey) -> Option<WakeEntry<T>> {
        self.get(key)?;
        Some(self.take(key.index))
    }

    /// Unlink every entry of `bucket` whose wake tick is at or before
    /// `now_tick`, pushing owners to `due` in list order.
    pub fn drain_due(&mut self, bucket: usize, now_tick: u64, due: &mut Vec<T>) -> usize {
        let Some(mut cursor) = self.buckets.get(bucket).and_then(|b| b.head) else {
            return 0;
        };

        let mut drained = 0;
        loop {
            let (next, is_due) = {
                let entry = self.link(cursor);
                (entry.next, entry.wake_tick <= now_tick)
            };

            if is_due {
                let entry = self.take(cursor);
                due.push(entry.owner);
                drained += 1;
            }

            match next {
                Some(next) => cursor = next,
                None => break,
            }
        }
        drained
    }

    /// Iterate one bucket from head to tail.
    pub fn iter_bucket(&self, bucket: usize) -> BucketIter<'_, T> {
        BucketIter {
            table: self,
            cursor: self.buckets.get(bucket).and_then(|b| b.head),
        }
    }

    fn link(&self, index: u32) -> &WakeEntry<T> {
        match self.slots[index as usize].entry.as_ref() {
            Some(entry) => entry,
            None => unreachable!("bucket list links a free slot"),
        }
    }

    fn link_mut(&mut self, index: u32) -> &mut WakeEntry<T> {
        match self.slots[index as usize].entry.as_mut() {
            Some(entry) => entry,
            None => unreachable!("bucket list links a free slot"),
        }
    }

    /// Unlink an occupied slot and release it to the free list.
    fn take(&mut self, index: u32) -> WakeEntry<T> {
        let slot = &mut self.slots[index as usize];
        let entry = match slot.entry.take() {
            Some(entry) => entry,
            None => unreachable!("take on a free slot"),
        };
        slot.generation = slot.generation.wrapping_add(1);

        match entry.prev {
            Some(prev) => self.link_mut(prev).next = entry.next,
            None => self.buckets[entry.bucket].head = entry.next,
        }
        match entry.next {
            Some(next) => self.link_mut(next).prev = entry.prev,
            None => self.buckets[entry.bucket].tail = entry.prev,
        }

        self.buckets[entry.bucket].len -= 1;
        self.len -= 1;
        self.free.push(index);
        entry
    }
}

/// Iterator over one bucket's entries in append order.
pub struct BucketIter<'a, T> {
    table: &'a WakeBucketTable<T>,
    cursor: Option<u32>,
}

impl<'a, T> Iterator for BucketIter<'a, T> {
    type Item = &'a WakeEntry<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let entry = self.table.link(index);
        self.cursor = entry.next;
        Some(entry)
    }
}
