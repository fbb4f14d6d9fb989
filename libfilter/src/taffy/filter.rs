// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use tracing::debug;
use tracing::trace;

use super::SizeClass;
use super::builder::TaffyCuckooFilterBuilder;
use super::frozen::FrozenTaffyCuckooFilter;
use super::slot::Entry;
use super::slot::Locator;
use super::table::BUCKET_SIZE;
use super::table::BucketTable;
use crate::error::Error;

const KICK_MULTIPLIER: u64 = 0xD6E8_FEB8_6659_FD93;

/// Outcome of placing one entry with the bounded eviction walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    /// The entry, or whatever it displaced, found a free slot after `kicks` evictions.
    Placed { kicks: u32 },
    /// Every kick was spent. The walk was rolled back, so the table is unchanged.
    Exhausted,
}

/// A growable cuckoo filter for approximate membership queries over 64-bit hashes.
///
/// The filter starts small and doubles its bucket table whenever the eviction walk runs out of
/// kicks. Items inserted earlier are never lost: every stored fingerprint keeps enough address
/// bits to be redistributed without the original hash.
///
/// Use [`TaffyCuckooFilterBuilder`] to construct instances.
///
/// Equality is structural: two filters are equal when they have the same [`SizeClass`] and the
/// same slots in the same order. The kick budget is not part of the comparison.
#[derive(Debug, Clone)]
pub struct TaffyCuckooFilter {
    pub(super) table: BucketTable,
    /// Maximum number of evictions per placement attempt
    pub(super) max_kicks: u32,
}

impl PartialEq for TaffyCuckooFilter {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl Eq for TaffyCuckooFilter {}

impl TaffyCuckooFilter {
    /// Creates a filter sized for roughly `bytes` bytes of storage.
    ///
    /// Shorthand for `TaffyCuckooFilterBuilder::with_bytes(bytes).build()`.
    ///
    /// # Panics
    ///
    /// Panics if the table cannot be allocated; use
    /// [`TaffyCuckooFilterBuilder::try_build`] for budgets near `u64::MAX`.
    pub fn with_bytes(bytes: u64) -> Self {
        TaffyCuckooFilterBuilder::with_bytes(bytes).build()
    }

    /// Creates a filter whose initial table fits `ndv` distinct values.
    ///
    /// Shorthand for `TaffyCuckooFilterBuilder::with_ndv_fpp(ndv, fpp).build()`.
    ///
    /// # Panics
    ///
    /// Panics if `fpp` is not in (0.0, 1.0], or if the table cannot be allocated.
    pub fn with_ndv_fpp(ndv: u64, fpp: f64) -> Self {
        TaffyCuckooFilterBuilder::with_ndv_fpp(ndv, fpp).build()
    }

    /// Tests whether a hash is possibly in the set.
    ///
    /// Returns:
    /// - `true`: the hash was **possibly** inserted (or false positive)
    /// - `false`: the hash was **definitely not** inserted
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilter;
    /// let mut filter = TaffyCuckooFilter::with_bytes(0);
    /// filter.insert_hash(0x1234).unwrap();
    ///
    /// assert!(filter.contains_hash(0x1234));
    /// assert!(!filter.contains_hash(0x5678));
    /// ```
    pub fn contains_hash(&self, hash: u64) -> bool {
        let locator = Locator::new(hash, self.table.size_class());
        self.table.covers(locator.primary) | self.table.covers(locator.secondary)
    }

    /// Inserts a hash into the filter, growing the table if the eviction walk runs dry.
    ///
    /// After a successful insertion, `contains_hash(hash)` returns `true` for the lifetime of
    /// this filter and of every filter derived from it. Inserting a hash that is already
    /// reported present leaves the filter unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InsertExhausted`](crate::error::ErrorKind::InsertExhausted) if the
    /// hash still finds no slot after one growth step, or if the filter is already at
    /// [`SizeClass::MAX`]. The filter remains valid and keeps every earlier insertion.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilter;
    /// let mut filter = TaffyCuckooFilter::with_bytes(0);
    /// for hash in 0..1000u64 {
    ///     filter.insert_hash(hash.wrapping_mul(0x9E37_79B9_7F4A_7C15)).unwrap();
    /// }
    /// assert!(filter.size_class().log() > 0);
    /// assert!(filter.contains_hash(999u64.wrapping_mul(0x9E37_79B9_7F4A_7C15)));
    /// ```
    pub fn insert_hash(&mut self, hash: u64) -> Result<(), Error> {
        if self.contains_hash(hash) {
            return Ok(());
        }

        let entry = Locator::new(hash, self.table.size_class()).primary;
        if let Placement::Placed { kicks } = self.place(entry) {
            trace!(hash, kicks, "placed fingerprint");
            return Ok(());
        }

        self.grow()?;
        let entry = Locator::new(hash, self.table.size_class()).primary;
        match self.place(entry) {
            Placement::Placed { kicks } => {
                trace!(hash, kicks, "placed fingerprint after growth");
                Ok(())
            }
            Placement::Exhausted => Err(Error::insert_exhausted(
                "eviction walk exhausted after growth",
            )
            .with_context("max_kicks", self.max_kicks)
            .with_context("size_class", self.table.size_class().log())),
        }
    }

    /// Converts this filter into an immutable filter optimized for lookups.
    ///
    /// Every hash reported present by this filter is reported present by the frozen one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilter;
    /// let mut filter = TaffyCuckooFilter::with_bytes(0);
    /// filter.insert_hash(42).unwrap();
    ///
    /// let frozen = filter.freeze();
    /// assert!(frozen.contains_hash(42));
    /// assert!(frozen.size_in_bytes() <= filter.size_in_bytes());
    /// ```
    pub fn freeze(&self) -> FrozenTaffyCuckooFilter {
        FrozenTaffyCuckooFilter::from_table(&self.table)
    }

    /// Returns whether no fingerprint has been stored.
    pub fn is_empty(&self) -> bool {
        self.table.num_occupied() == 0
    }

    /// Returns the current size class.
    pub fn size_class(&self) -> SizeClass {
        self.table.size_class()
    }

    /// Returns the number of buckets in the table.
    pub fn num_buckets(&self) -> usize {
        self.table.num_buckets()
    }

    /// Returns the number of occupied slots.
    ///
    /// Growth can copy a fingerprint whose address bits are used up into two buckets, so this
    /// may exceed the number of distinct inserted hashes.
    pub fn num_tags(&self) -> u64 {
        self.table.num_occupied()
    }

    /// Returns the total number of slots in the table.
    pub fn capacity(&self) -> u64 {
        (self.table.num_buckets() * BUCKET_SIZE) as u64
    }

    /// Returns the fraction of occupied slots.
    pub fn load_factor(&self) -> f64 {
        self.num_tags() as f64 / self.capacity() as f64
    }

    /// Returns the maximum number of evictions tried before the table grows.
    pub fn max_kicks(&self) -> u32 {
        self.max_kicks
    }

    /// Returns the size of the bucket table in bytes.
    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of_val(self.table.buckets())
    }

    /// Doubles the bucket table in place.
    ///
    /// The new table is built aside and swapped in, so a failure leaves the filter untouched.
    pub(super) fn grow(&mut self) -> Result<(), Error> {
        let from = self.table.size_class();
        let Some(table) = self.table.grown() else {
            return Err(Error::insert_exhausted("size class limit reached")
                .with_context("size_class", from.log()));
        };
        debug!(
            from = from.log(),
            to = table.size_class().log(),
            num_tags = table.num_occupied(),
            "grew taffy cuckoo filter"
        );
        self.table = table;
        Ok(())
    }

    /// Stores an entry in its bucket or its alternate, evicting residents if both are full.
    ///
    /// Each kick swaps the homeless entry into a slot of the current bucket and sends the
    /// evicted one to its alternate bucket. When `max_kicks` is spent the swaps are replayed in
    /// reverse, which restores every moved slot.
    pub(super) fn place(&mut self, entry: Entry) -> Placement {
        if self.table.try_put(entry) {
            return Placement::Placed { kicks: 0 };
        }
        let size_class = self.table.size_class();
        let alternate = entry.alternate(size_class);
        if self.table.try_put(alternate) {
            return Placement::Placed { kicks: 0 };
        }

        let mut current = if entry.slot.fingerprint() & 1 == 0 {
            entry
        } else {
            alternate
        };
        let mut path = Vec::new();
        for kick in 0..self.max_kicks {
            let index = victim_index(kick, current);
            let victim = self.table.swap(current.address, index, current.slot);
            path.push((current.address, index));
            current = Entry {
                address: current.address,
                slot: victim,
            }
            .alternate(size_class);
            if self.table.try_put(current) {
                return Placement::Placed { kicks: kick + 1 };
            }
        }

        for &(address, index) in path.iter().rev() {
            let evicted = current.alternate(size_class);
            debug_assert_eq!(evicted.address, address);
            let displaced = self.table.swap(address, index, evicted.slot);
            current = Entry {
                address,
                slot: displaced,
            };
        }
        debug_assert!(current == entry || current == alternate);
        trace!(
            max_kicks = self.max_kicks,
            size_class = size_class.log(),
            "eviction walk exhausted"
        );
        Placement::Exhausted
    }
}

/// Picks the slot to evict on a kick. The walk is a deterministic function of the kick number and
/// the homeless entry, so identical insert sequences build identical tables.
fn victim_index(kick: u32, entry: Entry) -> usize {
    let key =
        (u64::from(kick) << 48) ^ ((entry.address as u64) << 16) ^ u64::from(entry.slot.raw());
    ((key.wrapping_mul(KICK_MULTIPLIER) >> 32) as usize) % BUCKET_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut filter = TaffyCuckooFilter::with_bytes(0);
        assert!(filter.is_empty());
        assert!(!filter.contains_hash(0x1234));

        filter.insert_hash(0x1234).unwrap();
        assert!(filter.contains_hash(0x1234));
        assert_eq!(filter.num_tags(), 1);
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut filter = TaffyCuckooFilter::with_bytes(64);
        filter.insert_hash(7).unwrap();
        let before = filter.clone();
        filter.insert_hash(7).unwrap();
        assert_eq!(filter, before);
        assert_eq!(filter.num_tags(), 1);
    }

    #[test]
    fn test_grows_on_exhaustion() {
        // One bucket whose alternate is itself: the fifth distinct fingerprint forces growth.
        let mut filter = TaffyCuckooFilter::with_bytes(0);
        for fingerprint in 1..=5u64 {
            filter.insert_hash(fingerprint).unwrap();
        }
        assert_eq!(filter.size_class().log(), 1);
        assert_eq!(filter.num_tags(), 5);
        for fingerprint in 1..=5u64 {
            assert!(filter.contains_hash(fingerprint));
        }
    }

    #[test]
    fn test_exhausted_walk_rolls_back() {
        let mut filter = TaffyCuckooFilterBuilder::with_bytes(16).max_kicks(3).build();
        let mut hash = 0u64;
        for _ in 0..10_000 {
            let before = filter.clone();
            hash = hash.wrapping_add(0x9E37_79B9_7F4A_7C15);
            if filter.contains_hash(hash) {
                continue;
            }
            let entry = Locator::new(hash, filter.size_class()).primary;
            if filter.place(entry) == Placement::Exhausted {
                assert_eq!(filter, before);
                assert_eq!(filter.num_tags(), before.num_tags());
                return;
            }
        }
        panic!("eviction walk never ran out of kicks");
    }

    #[test]
    fn test_size_accounting() {
        let filter = TaffyCuckooFilter::with_bytes(1024);
        assert_eq!(filter.num_buckets(), 128);
        assert_eq!(filter.size_in_bytes(), 1024);
        assert_eq!(filter.capacity(), 512);
        assert_eq!(filter.load_factor(), 0.0);
    }

    #[test]
    fn test_equality_ignores_kick_budget() {
        let x = TaffyCuckooFilterBuilder::with_bytes(64).max_kicks(10).build();
        let y = TaffyCuckooFilterBuilder::with_bytes(64).max_kicks(20).build();
        assert_eq!(x, y);
    }
}
