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

//! Taffy block filter integration tests

mod common;

use common::random_hashes;
use googletest::assert_that;
use googletest::prelude::gt;
use googletest::prelude::lt;
use libfilter::block::TaffyBlockFilter;

#[test]
fn test_insert_persists_under_growth() {
    let hashes = random_hashes(40, 100_000);
    let mut filter = TaffyBlockFilter::with_ndv_fpp(1, 0.001);

    let mut last_levels = filter.num_levels();
    for (i, &hash) in hashes.iter().enumerate() {
        filter.insert_hash(hash);
        assert!(filter.contains_hash(hash), "lost {hash:#x} right after insertion");
        if filter.num_levels() != last_levels {
            last_levels = filter.num_levels();
            assert!(hashes[..=i].iter().all(|&h| filter.contains_hash(h)));
        }
    }
    assert_that!(filter.num_levels(), gt(10));
    assert!(hashes.iter().all(|&hash| filter.contains_hash(hash)));
}

#[test]
fn test_start_empty() {
    let queries = random_hashes(41, 1_000_000);
    for filter in [
        TaffyBlockFilter::with_ndv_fpp(1, 0.001),
        TaffyBlockFilter::with_ndv_fpp(1_000_000, 0.01),
    ] {
        assert!(filter.is_empty());
        assert!(queries.iter().all(|&query| !filter.contains_hash(query)));
    }
}

#[test]
fn test_false_positive_rate_under_growth() {
    let inserted = random_hashes(42, 200_000);
    let queries = random_hashes(43, 500_000);
    for fpp in [0.01, 0.001] {
        let mut filter = TaffyBlockFilter::with_ndv_fpp(32, fpp);
        for &hash in &inserted {
            filter.insert_hash(hash);
        }
        assert_that!(filter.num_levels(), gt(10));

        let found = queries.iter().filter(|&&p| filter.contains_hash(p)).count();
        let measured = found as f64 / queries.len() as f64;
        assert_that!(measured, lt(fpp));
    }
}

#[test]
fn test_space_tracks_inserts() {
    let inserted = random_hashes(44, 100_000);
    let mut filter = TaffyBlockFilter::with_ndv_fpp(32, 0.01);
    for &hash in &inserted {
        filter.insert_hash(hash);
    }
    // The newest level is mostly empty right after it is pushed.
    let bits_per_hash = filter.size_in_bytes() as f64 * 8.0 / inserted.len() as f64;
    assert_that!(bits_per_hash, gt(10.0));
    assert_that!(bits_per_hash, lt(128.0));
}
