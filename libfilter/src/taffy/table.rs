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

use super::SizeClass;
use super::slot::Entry;
use super::slot::Slot;
use crate::error::Error;

/// Number of slots per bucket.
pub(crate) const BUCKET_SIZE: usize = 4;

/// A fixed-arity bucket. Occupied slots always precede empty ones.
pub(crate) type Bucket = [Slot; BUCKET_SIZE];

/// The growable array of buckets backing a taffy cuckoo filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BucketTable {
    size_class: SizeClass,
    /// Number of occupied slots
    occupied: u64,
    buckets: Vec<Bucket>,
}

impl BucketTable {
    pub(crate) fn new(size_class: SizeClass) -> Self {
        BucketTable {
            size_class,
            occupied: 0,
            buckets: vec![[Slot::EMPTY; BUCKET_SIZE]; size_class.num_buckets() as usize],
        }
    }

    /// Allocates an empty table, reporting an allocation the system refuses instead of aborting.
    pub(crate) fn try_new(size_class: SizeClass) -> Result<Self, Error> {
        let num_buckets = size_class.num_buckets();
        let failed = || {
            Error::allocation_failed(num_buckets).with_context("size_class", size_class.log())
        };
        let len = usize::try_from(num_buckets).map_err(|_| failed())?;
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(len).map_err(|_| failed())?;
        buckets.resize(len, [Slot::EMPTY; BUCKET_SIZE]);
        Ok(BucketTable {
            size_class,
            occupied: 0,
            buckets,
        })
    }

    /// Rebuilds a table from decoded buckets, checking that every bucket is filled front to back
    /// and holds only well-formed slots.
    pub(crate) fn from_buckets(size_class: SizeClass, buckets: Vec<Bucket>) -> Result<Self, Error> {
        if buckets.len() as u64 != size_class.num_buckets() {
            return Err(Error::deserial(format!(
                "expected {} buckets, got {}",
                size_class.num_buckets(),
                buckets.len()
            )));
        }

        let mut occupied = 0;
        for (address, bucket) in buckets.iter().enumerate() {
            let mut seen_empty = false;
            for slot in bucket {
                if !slot.is_valid() {
                    return Err(Error::deserial("slot without tail terminator")
                        .with_context("bucket", address)
                        .with_context("slot", format!("{:#06x}", slot.raw())));
                }
                if slot.is_empty() {
                    seen_empty = true;
                } else if seen_empty {
                    return Err(Error::deserial("occupied slot after an empty slot")
                        .with_context("bucket", address));
                } else {
                    occupied += 1;
                }
            }
        }

        Ok(BucketTable {
            size_class,
            occupied,
            buckets,
        })
    }

    pub(crate) fn size_class(&self) -> SizeClass {
        self.size_class
    }

    pub(crate) fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn num_occupied(&self) -> u64 {
        self.occupied
    }

    pub(crate) fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Returns whether any slot of the entry's bucket covers the entry's (query) slot.
    pub(crate) fn covers(&self, query: Entry) -> bool {
        self.buckets[query.address]
            .iter()
            .fold(false, |found, slot| found | slot.matches(query.slot))
    }

    /// Returns whether the entry's bucket stores exactly this slot.
    pub(crate) fn holds(&self, entry: Entry) -> bool {
        self.buckets[entry.address].contains(&entry.slot)
    }

    /// Puts the entry into the first free slot of its bucket.
    ///
    /// Returns `false` if the bucket is full.
    pub(crate) fn try_put(&mut self, entry: Entry) -> bool {
        let bucket = &mut self.buckets[entry.address];
        match bucket.iter_mut().find(|slot| slot.is_empty()) {
            Some(slot) => {
                *slot = entry.slot;
                self.occupied += 1;
                true
            }
            None => false,
        }
    }

    /// Replaces an occupied slot and returns the slot it held.
    pub(crate) fn swap(&mut self, address: usize, index: usize, slot: Slot) -> Slot {
        let previous = std::mem::replace(&mut self.buckets[address][index], slot);
        debug_assert!(!previous.is_empty() && !slot.is_empty());
        previous
    }

    /// Iterates over the occupied slots in canonical order: by address, then by slot index.
    pub(crate) fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .flat_map(|(address, bucket)| {
                bucket
                    .iter()
                    .take_while(|slot| !slot.is_empty())
                    .map(move |&slot| Entry { address, slot })
            })
    }

    /// Builds the table one size class up, splitting every bucket into its two children.
    ///
    /// Returns `None` at [`SizeClass::MAX`]. A child receives entries from one parent only, so
    /// it never overflows.
    pub(crate) fn grown(&self) -> Option<BucketTable> {
        let mut table = BucketTable::new(self.size_class.next()?);
        for entry in self.entries() {
            for child in entry.grow() {
                let placed = table.try_put(child);
                debug_assert!(placed, "child bucket overflow at {}", child.address);
            }
        }
        Some(table)
    }

    /// Builds the table one size class down, merging every pair of sibling buckets.
    ///
    /// A slot with a spent tail that sits in both siblings collapses back into one slot, which
    /// undoes the copy made by growth. Every other slot takes the dropped address bit into its
    /// tail. Returns `None` if a merged bucket would overflow or a tail has no room left.
    pub(crate) fn folded(&self) -> Option<BucketTable> {
        let mut table = BucketTable::new(self.size_class.prev()?);
        for (parent, pair) in self.buckets.chunks_exact(2).enumerate() {
            let (low, high) = (&pair[0], &pair[1]);
            let mut merged = [false; BUCKET_SIZE];
            for &slot in low.iter().take_while(|slot| !slot.is_empty()) {
                let twin = if slot.tail_len() == 0 {
                    (0..BUCKET_SIZE).find(|&i| !merged[i] && high[i] == slot)
                } else {
                    None
                };
                let entry = match twin {
                    Some(i) => {
                        merged[i] = true;
                        Entry {
                            address: parent,
                            slot,
                        }
                    }
                    None => Entry {
                        address: 2 * parent,
                        slot,
                    }
                    .shrink()?,
                };
                if !table.try_put(entry) {
                    return None;
                }
            }
            for (i, &slot) in high.iter().enumerate() {
                if slot.is_empty() {
                    break;
                }
                if merged[i] {
                    continue;
                }
                let entry = Entry {
                    address: 2 * parent + 1,
                    slot,
                }
                .shrink()?;
                if !table.try_put(entry) {
                    return None;
                }
            }
        }
        Some(table)
    }
}
