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

//! Fingerprints, tails and bucket addresses.
//!
//! A hash `h` with fingerprint `f` has two preimages, `P1 = h` and `P2 = h ^ M(f)`. At size
//! class `log`, the top `log` bits of a preimage address a bucket and the [`TAIL_BITS`] bits that
//! follow are recorded in the slot as its tail. Growing the table moves the first tail bit into
//! the address, so stored slots carry everything growth needs and the hash itself is never kept.

use std::iter;

use super::SizeClass;

/// Number of fingerprint bits stored in every slot.
pub(crate) const FINGERPRINT_BITS: u32 = 10;
/// Maximum number of address bits a slot keeps for future growth.
pub(crate) const TAIL_BITS: u32 = 5;

const TAIL_FIELD_BITS: u32 = TAIL_BITS + 1;
const TAIL_FIELD_MASK: u16 = (1 << TAIL_FIELD_BITS) - 1;
const FINGERPRINT_MASK: u64 = (1 << FINGERPRINT_BITS) - 1;
const ALTERNATE_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// A 16-bit bucket slot: a fingerprint followed by a tail of up to [`TAIL_BITS`] bits.
///
/// The tail field holds `(tail << 1 | 1) << (TAIL_BITS - len)`, so the lowest set bit marks
/// where the tail ends. Zero is the empty sentinel; occupied slots always have a non-zero tail
/// field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct Slot(u16);

impl Slot {
    pub(crate) const EMPTY: Slot = Slot(0);

    pub(crate) fn new(fingerprint: u16, tail: u16, tail_len: u32) -> Slot {
        debug_assert!(u64::from(fingerprint) <= FINGERPRINT_MASK);
        debug_assert!(tail_len <= TAIL_BITS);
        debug_assert!(u32::from(tail) < (1 << tail_len));
        let field = ((tail << 1) | 1) << (TAIL_BITS - tail_len);
        Slot((fingerprint << TAIL_FIELD_BITS) | field)
    }

    pub(crate) fn from_raw(raw: u16) -> Slot {
        Slot(raw)
    }

    pub(crate) fn raw(self) -> u16 {
        self.0
    }

    pub(crate) fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether the slot is either empty or carries a tail terminator.
    pub(crate) fn is_valid(self) -> bool {
        self.is_empty() || self.0 & TAIL_FIELD_MASK != 0
    }

    pub(crate) fn fingerprint(self) -> u16 {
        self.0 >> TAIL_FIELD_BITS
    }

    pub(crate) fn tail_len(self) -> u32 {
        TAIL_BITS - self.0.trailing_zeros()
    }

    pub(crate) fn tail(self) -> u16 {
        (self.0 & TAIL_FIELD_MASK) >> (self.0.trailing_zeros() + 1)
    }

    /// Returns whether a query slot, which always carries a full tail, is covered by this slot.
    ///
    /// Fingerprints must be equal and the stored tail must be a prefix of the query tail.
    pub(crate) fn matches(self, query: Slot) -> bool {
        let terminator = self.0 & self.0.wrapping_neg();
        let mask = !(terminator << 1).wrapping_sub(1);
        (self.0 != 0) & (((self.0 ^ query.0) & mask) == 0)
    }
}

/// A slot together with the bucket it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) address: usize,
    pub(crate) slot: Slot,
}

/// The result of growing one entry by a size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Split {
    /// The first tail bit picked one child bucket.
    One(Entry),
    /// The tail was empty, so the entry covers both child buckets.
    Both(Entry, Entry),
}

impl IntoIterator for Split {
    type Item = Entry;
    type IntoIter = iter::Chain<iter::Once<Entry>, std::option::IntoIter<Entry>>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Split::One(entry) => iter::once(entry).chain(None),
            Split::Both(low, high) => iter::once(low).chain(Some(high)),
        }
    }
}

impl Entry {
    /// Moves the entry to the bucket its other preimage addresses.
    ///
    /// This is an involution: applying it twice at the same size class yields the entry back.
    pub(crate) fn alternate(self, size_class: SizeClass) -> Entry {
        let fingerprint = self.slot.fingerprint();
        let tail_len = self.slot.tail_len();
        let mask = alternate_mask(fingerprint);
        let log = size_class.log();
        Entry {
            address: self.address ^ prefix(mask, log) as usize,
            slot: Slot::new(
                fingerprint,
                self.slot.tail() ^ bits_after_prefix(mask, log, tail_len) as u16,
                tail_len,
            ),
        }
    }

    /// Re-addresses the entry one size class up.
    ///
    /// The old address and slot alone decide the child bucket: the first tail bit becomes the
    /// lowest address bit. An entry whose tail is used up lands in both children.
    pub(crate) fn grow(self) -> Split {
        let fingerprint = self.slot.fingerprint();
        let tail_len = self.slot.tail_len();
        let address = self.address << 1;
        if tail_len == 0 {
            return Split::Both(
                Entry {
                    address,
                    slot: self.slot,
                },
                Entry {
                    address: address | 1,
                    slot: self.slot,
                },
            );
        }
        let tail = self.slot.tail();
        let rest_len = tail_len - 1;
        Split::One(Entry {
            address: address | usize::from(tail >> rest_len),
            slot: Slot::new(fingerprint, tail & ((1 << rest_len) - 1), rest_len),
        })
    }

    /// Re-addresses the entry one size class down, pushing its lowest address bit into the tail.
    ///
    /// Returns `None` if the tail is already full.
    pub(crate) fn shrink(self) -> Option<Entry> {
        let tail_len = self.slot.tail_len();
        if tail_len == TAIL_BITS {
            return None;
        }
        let low_bit = (self.address & 1) as u16;
        Some(Entry {
            address: self.address >> 1,
            slot: Slot::new(
                self.slot.fingerprint(),
                (low_bit << tail_len) | self.slot.tail(),
                tail_len + 1,
            ),
        })
    }
}

/// The two candidate entries of a hash at a given size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Locator {
    pub(crate) primary: Entry,
    pub(crate) secondary: Entry,
}

impl Locator {
    pub(crate) fn new(hash: u64, size_class: SizeClass) -> Locator {
        let log = size_class.log();
        let primary = Entry {
            address: prefix(hash, log) as usize,
            slot: Slot::new(
                (hash & FINGERPRINT_MASK) as u16,
                bits_after_prefix(hash, log, TAIL_BITS) as u16,
                TAIL_BITS,
            ),
        };
        Locator {
            primary,
            secondary: primary.alternate(size_class),
        }
    }
}

fn alternate_mask(fingerprint: u16) -> u64 {
    (u64::from(fingerprint) + 1).wrapping_mul(ALTERNATE_MULTIPLIER)
}

fn prefix(value: u64, log: u8) -> u64 {
    if log == 0 {
        0
    } else {
        value >> (64 - u32::from(log))
    }
}

fn bits_after_prefix(value: u64, log: u8, len: u32) -> u64 {
    if len == 0 {
        0
    } else {
        (value << log) >> (64 - len)
    }
}
