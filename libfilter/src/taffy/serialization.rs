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

//! Byte layout of a serialized [`TaffyCuckooFilter`].
//!
//! All integers are little-endian:
//!
//! | Offset | Size         | Field                                        |
//! |--------|--------------|----------------------------------------------|
//! | 0      | 1            | family id                                    |
//! | 1      | 1            | size class (log2 of the bucket count)        |
//! | 2      | 1            | slots per bucket                             |
//! | 3      | 1            | fingerprint bits                             |
//! | 4      | 1            | tail bits                                    |
//! | 5      | 3            | zero                                         |
//! | 8      | 8            | number of occupied slots                     |
//! | 16     | `8 * 2^log`  | buckets in address order, slots as `u16`     |

use super::DEFAULT_MAX_KICKS;
use super::SizeClass;
use super::TaffyCuckooFilter;
use super::slot::FINGERPRINT_BITS;
use super::slot::Slot;
use super::slot::TAIL_BITS;
use super::table::BUCKET_SIZE;
use super::table::Bucket;
use super::table::BucketTable;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::codec::family::Family;
use crate::error::Error;

const HEADER_BYTES: usize = 16;
const BUCKET_BYTES: u64 = (BUCKET_SIZE * 2) as u64;

impl TaffyCuckooFilter {
    /// Serializes the filter to bytes.
    ///
    /// The kick budget is not part of the output.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilter;
    /// let filter = TaffyCuckooFilter::with_bytes(0);
    /// let bytes = filter.serialize();
    /// assert_eq!(bytes.len(), 24);
    /// assert_eq!(&bytes[..5], &[1, 0, 4, 10, 5]);
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = FilterBytes::with_capacity(HEADER_BYTES + self.size_in_bytes());

        bytes.write_u8(Family::TAFFY_CUCKOO.id);
        bytes.write_u8(self.size_class().log());
        bytes.write_u8(BUCKET_SIZE as u8);
        bytes.write_u8(FINGERPRINT_BITS as u8);
        bytes.write_u8(TAIL_BITS as u8);
        bytes.write(&[0; 3]);
        bytes.write_u64_le(self.num_tags());
        debug_assert_eq!(bytes.len(), HEADER_BYTES);

        for bucket in self.table.buckets() {
            for slot in bucket {
                bytes.write_u16_le(slot.raw());
            }
        }

        bytes.into_bytes()
    }

    /// Deserializes a filter from bytes.
    ///
    /// The decoded filter uses [`DEFAULT_MAX_KICKS`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::LengthMismatch`](crate::error::ErrorKind::LengthMismatch) if the
    /// input is not exactly as long as its size class requires, and
    /// [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if:
    /// - The header is truncated
    /// - The family or a layout parameter doesn't match
    /// - A slot is malformed, or an occupied slot follows an empty one in its bucket
    /// - The stored tag count disagrees with the buckets
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilter;
    /// let mut original = TaffyCuckooFilter::with_bytes(1024);
    /// original.insert_hash(0xDEAD_BEEF).unwrap();
    /// let bytes = original.serialize();
    ///
    /// let restored = TaffyCuckooFilter::deserialize(&bytes).unwrap();
    /// assert_eq!(original, restored);
    /// assert!(restored.contains_hash(0xDEAD_BEEF));
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = FilterSlice::new(bytes);

        let family_id = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("family_id"))?;
        let log = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("size_class"))?;
        let bucket_size = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("bucket_size"))?;
        let fingerprint_bits = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("fingerprint_bits"))?;
        let tail_bits = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("tail_bits"))?;
        let mut padding = [0u8; 3];
        cursor
            .read_exact(&mut padding)
            .map_err(|_| Error::insufficient_data("padding"))?;
        let num_tags = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("num_tags"))?;

        Family::TAFFY_CUCKOO.validate_id(family_id)?;
        if bucket_size != BUCKET_SIZE as u8 {
            return Err(Error::invalid_layout(
                "bucket_size",
                BUCKET_SIZE as u8,
                bucket_size,
            ));
        }
        if fingerprint_bits != FINGERPRINT_BITS as u8 {
            return Err(Error::invalid_layout(
                "fingerprint_bits",
                FINGERPRINT_BITS as u8,
                fingerprint_bits,
            ));
        }
        if tail_bits != TAIL_BITS as u8 {
            return Err(Error::invalid_layout(
                "tail_bits",
                TAIL_BITS as u8,
                tail_bits,
            ));
        }
        if padding != [0; 3] {
            return Err(Error::deserial("non-zero padding"));
        }
        let size_class = SizeClass::new(log).ok_or_else(|| {
            Error::deserial(format!(
                "size class {log} exceeds maximum {}",
                SizeClass::MAX.log()
            ))
        })?;

        let expected = HEADER_BYTES as u64 + BUCKET_BYTES * size_class.num_buckets();
        if bytes.len() as u64 != expected {
            return Err(Error::length_mismatch(
                usize::try_from(expected).unwrap_or(usize::MAX),
                bytes.len(),
            )
            .with_context("size_class", log));
        }

        let mut buckets: Vec<Bucket> = Vec::with_capacity(size_class.num_buckets() as usize);
        for _ in 0..size_class.num_buckets() {
            let mut bucket = [Slot::EMPTY; BUCKET_SIZE];
            for slot in &mut bucket {
                let raw = cursor
                    .read_u16_le()
                    .map_err(|_| Error::insufficient_data("bucket"))?;
                *slot = Slot::from_raw(raw);
            }
            buckets.push(bucket);
        }

        let table = BucketTable::from_buckets(size_class, buckets)?;
        if table.num_occupied() != num_tags {
            return Err(Error::deserial(format!(
                "tag count {num_tags} disagrees with {} occupied slots",
                table.num_occupied()
            )));
        }

        Ok(TaffyCuckooFilter {
            table,
            max_kicks: DEFAULT_MAX_KICKS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_empty_layout() {
        let bytes = TaffyCuckooFilter::with_bytes(0).serialize();
        let mut expected = vec![1, 0, 4, 10, 5, 0, 0, 0];
        expected.extend_from_slice(&[0; 16]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_single_tag_layout() {
        let mut filter = TaffyCuckooFilter::with_bytes(0);
        filter.insert_hash(0x1234).unwrap();
        let bytes = filter.serialize();
        assert_eq!(&bytes[8..16], &1u64.to_le_bytes());
        assert_eq!(&bytes[16..18], &[0x01, 0x8D]);
        assert_eq!(&bytes[18..], &[0; 6]);
    }

    #[test]
    fn test_round_trip_keeps_structure() {
        let mut filter = TaffyCuckooFilter::with_bytes(256);
        for i in 0..100u64 {
            filter
                .insert_hash(i.wrapping_mul(0x9E37_79B9_7F4A_7C15))
                .unwrap();
        }
        let restored = TaffyCuckooFilter::deserialize(&filter.serialize()).unwrap();
        assert_eq!(restored, filter);
        assert_eq!(restored.num_tags(), filter.num_tags());
        assert_eq!(restored.max_kicks(), DEFAULT_MAX_KICKS);
        assert_eq!(restored.serialize(), filter.serialize());
    }

    #[test]
    fn test_truncated_header() {
        let bytes = TaffyCuckooFilter::with_bytes(0).serialize();
        let err = TaffyCuckooFilter::deserialize(&bytes[..10]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.message(), "insufficient data: num_tags");
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = TaffyCuckooFilter::with_bytes(0).serialize();
        bytes.pop();
        let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);

        bytes.extend_from_slice(&[0, 0]);
        let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);
    }

    #[test]
    fn test_rejects_bad_header_fields() {
        let good = TaffyCuckooFilter::with_bytes(0).serialize();
        for (offset, value) in [(0, 2), (2, 8), (3, 12), (4, 6), (5, 1), (7, 1), (1, 49)] {
            let mut bytes = good.clone();
            bytes[offset] = value;
            let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData, "offset {offset}");
        }
    }

    #[test]
    fn test_rejects_bad_payload() {
        let mut filter = TaffyCuckooFilter::with_bytes(0);
        filter.insert_hash(0x1234).unwrap();
        let good = filter.serialize();

        // tag count disagrees
        let mut bytes = good.clone();
        bytes[8] = 2;
        let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        // fingerprint without a tail terminator
        let mut bytes = good.clone();
        bytes[16] = 0x00;
        let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        // occupied slot after an empty one
        let mut bytes = good;
        bytes.copy_within(16..18, 18);
        bytes[16] = 0;
        bytes[17] = 0;
        let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
