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

use super::split::SplitBlockFilter;

/// A growable filter made of split block Bloom filters of increasing size.
///
/// Level `i` is sized for `ndv * 2^i` distinct values at a false positive probability of
/// `fpp / 2^(i + 1)`. Inserts go to the newest level; once it holds the values it was sized
/// for, a new level is pushed. A lookup checks every level, so the false positive probability
/// is at most the sum of the level targets, which stays below `fpp`.
///
/// Unlike [`TaffyCuckooFilter`](crate::taffy::TaffyCuckooFilter), levels are never rebuilt:
/// growth costs one allocation and no rehashing.
#[derive(Debug, Clone, PartialEq)]
pub struct TaffyBlockFilter {
    /// Oldest level first
    levels: Vec<SplitBlockFilter>,
    /// Distinct values the newest level is sized for
    level_ndv: u64,
    /// False positive probability the newest level is sized for
    level_fpp: f64,
    /// Inserts into the newest level
    level_inserts: u64,
    /// Target the filter was created with
    fpp: f64,
}

impl TaffyBlockFilter {
    /// Creates a filter whose first level holds `ndv` distinct values, with an overall false
    /// positive probability of at most `fpp`.
    ///
    /// # Panics
    ///
    /// Panics if `fpp` is not in (0.0, 1.0].
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::block::TaffyBlockFilter;
    /// let mut filter = TaffyBlockFilter::with_ndv_fpp(1, 0.001);
    /// filter.insert_hash(0x1234);
    /// filter.insert_hash(0x5678);
    /// assert!(filter.contains_hash(0x1234));
    /// assert_eq!(filter.num_levels(), 2);
    /// ```
    pub fn with_ndv_fpp(ndv: u64, fpp: f64) -> Self {
        assert!(
            fpp > 0.0 && fpp <= 1.0,
            "fpp must be between 0.0 and 1.0 (inclusive of 1.0)"
        );

        let level_ndv = ndv.max(1);
        let level_fpp = fpp / 2.0;
        TaffyBlockFilter {
            levels: vec![SplitBlockFilter::with_ndv_fpp(level_ndv, level_fpp)],
            level_ndv,
            level_fpp,
            level_inserts: 0,
            fpp,
        }
    }

    /// Inserts a hash, pushing a new level first if the newest one is full.
    ///
    /// After insertion, `contains_hash(hash)` returns `true`.
    pub fn insert_hash(&mut self, hash: u64) {
        if self.level_inserts >= self.level_ndv {
            self.push_level();
        }
        self.level_inserts += 1;
        if let Some(level) = self.levels.last_mut() {
            level.insert_hash(hash);
        }
    }

    /// Tests whether a hash is possibly in the set.
    pub fn contains_hash(&self, hash: u64) -> bool {
        self.levels.iter().any(|level| level.contains_hash(hash))
    }

    /// Returns whether nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.levels.len() == 1 && self.level_inserts == 0
    }

    /// Returns the number of levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns the false positive probability the filter was created with.
    pub fn fpp(&self) -> f64 {
        self.fpp
    }

    /// Returns the total size of all levels in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.levels.iter().map(SplitBlockFilter::size_in_bytes).sum()
    }

    fn push_level(&mut self) {
        self.level_ndv = self.level_ndv.saturating_mul(2);
        self.level_fpp /= 2.0;
        self.level_inserts = 0;
        let level = SplitBlockFilter::with_ndv_fpp(self.level_ndv, self.level_fpp);
        debug!(
            level = self.levels.len(),
            ndv = self.level_ndv,
            num_blocks = level.num_blocks(),
            "pushed taffy block filter level"
        );
        self.levels.push(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_double() {
        let mut filter = TaffyBlockFilter::with_ndv_fpp(4, 0.01);
        assert!(filter.is_empty());
        assert_eq!(filter.num_levels(), 1);

        // Levels hold 4, 8, 16 and 32 values.
        for hash in 0..60u64 {
            filter.insert_hash(hash.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        }
        assert_eq!(filter.num_levels(), 4);
        assert!(!filter.is_empty());
        assert_eq!(filter.fpp(), 0.01);
        for hash in 0..60u64 {
            assert!(filter.contains_hash(hash.wrapping_mul(0x9E37_79B9_7F4A_7C15)));
        }
    }

    #[test]
    fn test_size_grows_with_levels() {
        let mut filter = TaffyBlockFilter::with_ndv_fpp(1, 0.001);
        let mut last = filter.size_in_bytes();
        assert!(last >= 32);
        for hash in 0..100u64 {
            filter.insert_hash(hash);
            assert!(filter.size_in_bytes() >= last);
            last = filter.size_in_bytes();
        }
        let levels_size: usize = filter.levels.iter().map(|l| l.size_in_bytes()).sum();
        assert_eq!(filter.size_in_bytes(), levels_size);
    }

    #[test]
    fn test_zero_ndv_holds_one_value_per_first_level() {
        let mut filter = TaffyBlockFilter::with_ndv_fpp(0, 0.5);
        filter.insert_hash(1);
        assert_eq!(filter.num_levels(), 1);
        filter.insert_hash(2);
        assert_eq!(filter.num_levels(), 2);
    }

    #[test]
    #[should_panic(expected = "fpp must be between")]
    fn test_invalid_fpp() {
        TaffyBlockFilter::with_ndv_fpp(100, 0.0);
    }
}
