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

//! Taffy cuckoo filter serialization tests
//!
//! The conformance vectors pin the byte layout: any change to slot encoding, addressing, the
//! eviction walk or growth shows up here.

mod common;

use common::random_hashes;
use common::sizes_up_to;
use googletest::assert_that;
use googletest::prelude::eq;
use insta::assert_snapshot;
use libfilter::error::ErrorKind;
use libfilter::taffy::TaffyCuckooFilter;

fn header(log: u8, num_tags: u64) -> Vec<u8> {
    let mut bytes = vec![1, log, 4, 10, 5, 0, 0, 0];
    bytes.extend_from_slice(&num_tags.to_le_bytes());
    bytes
}

#[test]
fn test_empty_single_bucket_vector() {
    let filter = TaffyCuckooFilter::with_bytes(0);
    let mut expected = header(0, 0);
    expected.extend_from_slice(&[0; 8]);
    assert_eq!(filter.serialize(), expected);
}

#[test]
fn test_single_insert_vector() {
    let mut filter = TaffyCuckooFilter::with_bytes(0);
    filter.insert_hash(0x1234).unwrap();

    let mut expected = header(0, 1);
    expected.extend_from_slice(&[0x01, 0x8D, 0, 0, 0, 0, 0, 0]);
    assert_eq!(filter.serialize(), expected);
}

#[test]
fn test_second_bucket_vector() {
    let mut filter = TaffyCuckooFilter::with_bytes(16);
    assert_that!(filter.size_class().log(), eq(1));
    filter.insert_hash(0x8000_0000_0000_0001).unwrap();

    let mut expected = header(1, 1);
    expected.extend_from_slice(&[0; 8]);
    expected.extend_from_slice(&[0x41, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(filter.serialize(), expected);
}

#[test]
fn test_growth_vector() {
    let mut filter = TaffyCuckooFilter::with_bytes(0);
    for hash in [
        0x0000_0000_0000_0001,
        0x8000_0000_0000_0002,
        0x4000_0000_0000_0003,
        0xC000_0000_0000_0004,
    ] {
        filter.insert_hash(hash).unwrap();
    }
    assert_that!(filter.size_class().log(), eq(0));
    filter.insert_hash(0x5).unwrap();
    assert_that!(filter.size_class().log(), eq(1));

    let mut expected = header(1, 5);
    expected.extend_from_slice(&[0x42, 0x00, 0xE2, 0x00, 0x41, 0x01, 0x00, 0x00]);
    expected.extend_from_slice(&[0x82, 0x00, 0x22, 0x01, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(filter.serialize(), expected);

    let restored = TaffyCuckooFilter::deserialize(&expected).unwrap();
    assert_eq!(restored, filter);
}

#[test]
fn test_round_trip_across_sizes() {
    for ndv in sizes_up_to(1 << 20) {
        let hashes = random_hashes(ndv, ndv as usize);
        let mut filter = TaffyCuckooFilter::with_ndv_fpp(ndv, 0.01);
        for &hash in &hashes {
            filter.insert_hash(hash).unwrap();
        }

        let bytes = filter.serialize();
        assert_that!(bytes.len(), eq(16 + filter.size_in_bytes()));

        let restored = TaffyCuckooFilter::deserialize(&bytes).unwrap();
        assert_eq!(restored, filter, "ndv {ndv}");
        assert_that!(restored.num_tags(), eq(filter.num_tags()));
        for &hash in &hashes {
            assert!(restored.contains_hash(hash), "ndv {ndv}: lost {hash:#x}");
        }
    }
}

#[test]
fn test_round_trip_of_grown_filter() {
    let hashes = random_hashes(10, 30_000);
    let mut filter = TaffyCuckooFilter::with_bytes(0);
    for &hash in &hashes[..20_000] {
        filter.insert_hash(hash).unwrap();
    }
    let mut restored = TaffyCuckooFilter::deserialize(&filter.serialize()).unwrap();

    // The decoded filter keeps growing like the original.
    for &hash in &hashes[20_000..] {
        filter.insert_hash(hash).unwrap();
        restored.insert_hash(hash).unwrap();
    }
    assert_eq!(restored, filter);
}

#[test]
fn test_length_mismatch() {
    let mut filter = TaffyCuckooFilter::with_bytes(1024);
    filter.insert_hash(42).unwrap();
    let bytes = filter.serialize();

    let err = TaffyCuckooFilter::deserialize(&bytes[..bytes.len() - 8]).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::LengthMismatch));
    assert_snapshot!(
        err.to_string(),
        @"LengthMismatch, context: { size_class: 7 } => expected 1040 bytes, got 1032"
    );

    let mut longer = bytes.clone();
    longer.push(0);
    let err = TaffyCuckooFilter::deserialize(&longer).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::LengthMismatch));

    // A header claiming a larger table than the payload holds.
    let mut grown = bytes;
    grown[1] = 8;
    let err = TaffyCuckooFilter::deserialize(&grown).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::LengthMismatch));
}

#[test]
fn test_rejects_other_families() {
    let mut bytes = TaffyCuckooFilter::with_bytes(0).serialize();
    bytes[0] = 21;
    let err = TaffyCuckooFilter::deserialize(&bytes).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidData));
    assert_snapshot!(
        err.to_string(),
        @"InvalidData => invalid family: expected 1 (TAFFY_CUCKOO), got 21"
    );
}

#[test]
fn test_rejects_empty_input() {
    let err = TaffyCuckooFilter::deserialize(&[]).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidData));
}
