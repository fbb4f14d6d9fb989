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

use byteorder::ByteOrder;
use byteorder::LE;
use tracing::debug;

use super::SizeClass;
use super::slot::FINGERPRINT_BITS;
use super::slot::Locator;
use super::slot::Slot;
use super::table::BUCKET_SIZE;
use super::table::Bucket;
use super::table::BucketTable;

/// A frozen slot keeps the fingerprint and at most one tail bit, plus the terminator.
const LANE_BITS: usize = FINGERPRINT_BITS as usize + 2;
const LANE_MASK: u64 = (1 << LANE_BITS) - 1;
const BUCKET_BYTES: usize = BUCKET_SIZE * LANE_BITS / 8;
const BUCKET_MASK: u64 = (1 << (BUCKET_SIZE * LANE_BITS)) - 1;
/// Trailing bytes so the last bucket can be read with one 8-byte load.
const READ_SLACK: usize = 8 - BUCKET_BYTES;

/// An immutable, lookup-only snapshot of a [`TaffyCuckooFilter`](super::TaffyCuckooFilter).
///
/// Freezing folds the table down to the smallest size class that still holds every fingerprint,
/// then repacks every slot into 12 bits: the fingerprint and the first tail bit. The tail bits
/// beyond the first mostly serve growth, so dropping them trades a somewhat higher false
/// positive probability for a table a quarter smaller. A lookup still reads two buckets, each
/// with a single unaligned 8-byte load.
///
/// Frozen filters are never mutated, so they can be shared freely across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenTaffyCuckooFilter {
    size_class: SizeClass,
    /// Six bytes per bucket, slot `i` in bits `12 * i .. 12 * i + 12`, then `READ_SLACK` zeros
    bytes: Box<[u8]>,
}

impl FrozenTaffyCuckooFilter {
    pub(super) fn from_table(table: &BucketTable) -> Self {
        let mut folded: Option<BucketTable> = None;
        loop {
            match folded.as_ref().unwrap_or(table).folded() {
                Some(smaller) => folded = Some(smaller),
                None => break,
            }
        }
        let source = folded.as_ref().unwrap_or(table);

        let mut bytes = Vec::with_capacity(source.num_buckets() * BUCKET_BYTES + READ_SLACK);
        for bucket in source.buckets() {
            bytes.extend_from_slice(&pack(bucket).to_le_bytes()[..BUCKET_BYTES]);
        }
        bytes.extend_from_slice(&[0; READ_SLACK]);

        debug!(
            from = table.size_class().log(),
            to = source.size_class().log(),
            num_tags = source.num_occupied(),
            bytes = bytes.len(),
            "froze taffy cuckoo filter"
        );

        FrozenTaffyCuckooFilter {
            size_class: source.size_class(),
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Tests whether a hash is possibly in the set.
    ///
    /// Agrees with the originating filter on every hash it reported present.
    pub fn contains_hash(&self, hash: u64) -> bool {
        let locator = Locator::new(hash, self.size_class);
        word_covers(self.word(locator.primary.address), lane(locator.primary.slot))
            | word_covers(self.word(locator.secondary.address), lane(locator.secondary.slot))
    }

    /// Returns the size class after folding.
    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    /// Returns the size of the packed table in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    fn word(&self, address: usize) -> u64 {
        let offset = address * BUCKET_BYTES;
        LE::read_u64(&self.bytes[offset..offset + 8]) & BUCKET_MASK
    }
}

/// Re-encodes a slot as a frozen lane: `fingerprint << 2 | (first_tail_bit << 1 | 1)`, or
/// `fingerprint << 2 | 0b10` when the tail is spent. Empty slots stay zero.
fn lane(slot: Slot) -> u64 {
    if slot.is_empty() {
        return 0;
    }
    let field = match slot.tail_len() {
        0 => 0b10,
        len => ((slot.tail() >> (len - 1)) << 1) | 1,
    };
    (u64::from(slot.fingerprint()) << 2) | u64::from(field)
}

fn pack(bucket: &Bucket) -> u64 {
    bucket
        .iter()
        .enumerate()
        .fold(0, |word, (i, &slot)| word | (lane(slot) << (i * LANE_BITS)))
}

/// Returns whether any lane of the word covers the query lane.
///
/// Lanes compare like slots: the bits above the lowest set bit must agree.
fn word_covers(word: u64, query: u64) -> bool {
    (0..BUCKET_SIZE).fold(false, |found, i| {
        let stored = (word >> (i * LANE_BITS)) & LANE_MASK;
        let terminator = stored & stored.wrapping_neg();
        let mask = !((terminator << 1).wrapping_sub(1));
        found | ((stored != 0) & (((stored ^ query) & mask) == 0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taffy::TaffyCuckooFilter;

    #[test]
    fn test_pack_lanes() {
        let bucket = [
            Slot::from_raw(0x8d01),
            Slot::from_raw(0x0041),
            Slot::EMPTY,
            Slot::EMPTY,
        ];
        let word = pack(&bucket);
        assert_eq!(word, 0x0000_0000_0000_58d1);
        assert!(word_covers(word, lane(Slot::from_raw(0x8d01))));
        // Tails agreeing on the first bit are indistinguishable once frozen.
        assert!(word_covers(word, lane(Slot::new(0x234, 0b01111, 5))));
        assert!(!word_covers(word, lane(Slot::new(0x234, 0b10000, 5))));
        assert!(!word_covers(word, lane(Slot::new(0x235, 0, 5))));
    }

    #[test]
    fn test_spent_tail_covers_both_halves() {
        let word = pack(&[Slot::new(7, 0, 0), Slot::EMPTY, Slot::EMPTY, Slot::EMPTY]);
        assert_eq!(word, (7 << 2) | 0b10);
        assert!(word_covers(word, lane(Slot::new(7, 0b00000, 5))));
        assert!(word_covers(word, lane(Slot::new(7, 0b11111, 5))));
        assert!(!word_covers(word, lane(Slot::new(8, 0, 5))));
    }

    #[test]
    fn test_freeze_empty_folds_to_one_bucket() {
        let filter = TaffyCuckooFilter::with_bytes(1 << 16);
        let frozen = filter.freeze();
        // Nothing blocks folding an empty table.
        assert_eq!(frozen.size_class(), SizeClass::MIN);
        assert_eq!(frozen.size_in_bytes(), 8);
        assert!(!frozen.contains_hash(0x1234));
    }

    #[test]
    fn test_freeze_keeps_members() {
        let mut filter = TaffyCuckooFilter::with_bytes(0);
        let hashes: Vec<u64> = (1..=2000u64)
            .map(|i| i.wrapping_mul(0xA24B_AED4_963E_E407))
            .collect();
        for &hash in &hashes {
            filter.insert_hash(hash).unwrap();
        }
        let frozen = filter.freeze();
        assert!(frozen.size_class() <= filter.size_class());
        assert!(frozen.size_in_bytes() < filter.size_in_bytes());
        for &hash in &hashes {
            assert!(frozen.contains_hash(hash), "missing {hash:#x}");
        }
    }

    #[test]
    fn test_frozen_bytes_per_bucket() {
        let mut filter = TaffyCuckooFilter::with_bytes(0);
        for hash in 1..=5u64 {
            filter.insert_hash(hash.wrapping_mul(0x9E37_79B9_7F4A_7C15)).unwrap();
        }
        let frozen = filter.freeze();
        // Five tags never fit in a single bucket.
        assert!(frozen.size_class().log() >= 1);
        let num_buckets = frozen.size_class().num_buckets() as usize;
        assert_eq!(frozen.size_in_bytes(), num_buckets * BUCKET_BYTES + READ_SLACK);
        assert!(frozen.size_in_bytes() < num_buckets * 8);
    }

    #[test]
    fn test_frozen_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrozenTaffyCuckooFilter>();
    }
}
