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
use super::TaffyCuckooFilter;
use super::table::BUCKET_SIZE;
use super::table::BucketTable;
use crate::error::Error;

/// Default maximum number of evictions per placement before the table grows.
pub const DEFAULT_MAX_KICKS: u32 = 500;

/// Occupancy the initial table is sized for when built from a distinct-value count.
const TARGET_LOAD_FACTOR: f64 = 0.95;

const BUCKET_BYTES: u64 = (BUCKET_SIZE * 2) as u64;

/// Builder for creating [`TaffyCuckooFilter`] instances.
///
/// Provides two construction modes:
/// - [`with_bytes()`](Self::with_bytes): Start from a storage budget
/// - [`with_ndv_fpp()`](Self::with_ndv_fpp): Start from an expected number of distinct values
///
/// Either way the filter grows past its initial size on demand.
#[derive(Debug, Clone)]
pub struct TaffyCuckooFilterBuilder {
    size_class: SizeClass,
    max_kicks: u32,
}

impl TaffyCuckooFilterBuilder {
    /// Creates a builder whose table takes at most `bytes` bytes, and never less than one
    /// bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilterBuilder;
    /// let filter = TaffyCuckooFilterBuilder::with_bytes(4096).build();
    /// assert_eq!(filter.size_in_bytes(), 4096);
    ///
    /// let tiny = TaffyCuckooFilterBuilder::with_bytes(1).build();
    /// assert_eq!(tiny.num_buckets(), 1);
    /// ```
    pub fn with_bytes(bytes: u64) -> Self {
        TaffyCuckooFilterBuilder {
            size_class: Self::suggest_size_class_from_bytes(bytes),
            max_kicks: DEFAULT_MAX_KICKS,
        }
    }

    /// Creates a builder whose initial table holds `ndv` distinct values.
    ///
    /// The fingerprint width is fixed, so `fpp` only gets validated; growth keeps the false
    /// positive probability bounded by the load rather than by this estimate.
    ///
    /// # Panics
    ///
    /// Panics if `fpp` is not in (0.0, 1.0].
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilterBuilder;
    /// let filter = TaffyCuckooFilterBuilder::with_ndv_fpp(1_000_000, 0.01).build();
    /// assert!(filter.capacity() >= 1_000_000);
    /// ```
    pub fn with_ndv_fpp(ndv: u64, fpp: f64) -> Self {
        assert!(
            fpp > 0.0 && fpp <= 1.0,
            "fpp must be between 0.0 and 1.0 (inclusive of 1.0)"
        );

        TaffyCuckooFilterBuilder {
            size_class: Self::suggest_size_class_from_ndv(ndv),
            max_kicks: DEFAULT_MAX_KICKS,
        }
    }

    /// Sets the maximum number of evictions per placement (default: 500).
    ///
    /// # Panics
    ///
    /// Panics if `max_kicks` is 0.
    pub fn max_kicks(mut self, max_kicks: u32) -> Self {
        assert!(max_kicks > 0, "max_kicks must be greater than 0");
        self.max_kicks = max_kicks;
        self
    }

    /// Builds the filter.
    ///
    /// # Panics
    ///
    /// Panics if the bucket table cannot be allocated. See [`try_build()`](Self::try_build).
    pub fn build(self) -> TaffyCuckooFilter {
        match self.try_build() {
            Ok(filter) => filter,
            Err(err) => panic!("{err}"),
        }
    }

    /// Builds the filter, failing if the bucket table cannot be allocated.
    ///
    /// Budgets near `u64::MAX` bytes or values clamp to [`SizeClass::MAX`], whose table is far
    /// larger than any address space; those requests fail here instead of aborting the process.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument) if the
    /// allocation is refused.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::error::ErrorKind;
    /// # use libfilter::taffy::TaffyCuckooFilterBuilder;
    /// let filter = TaffyCuckooFilterBuilder::with_bytes(4096).try_build().unwrap();
    /// assert_eq!(filter.num_buckets(), 512);
    ///
    /// let err = TaffyCuckooFilterBuilder::with_bytes(u64::MAX).try_build().unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    /// ```
    pub fn try_build(self) -> Result<TaffyCuckooFilter, Error> {
        Ok(TaffyCuckooFilter {
            table: BucketTable::try_new(self.size_class)?,
            max_kicks: self.max_kicks,
        })
    }

    /// Suggests the largest size class whose table fits in `bytes`, or the smallest one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilterBuilder;
    /// assert_eq!(TaffyCuckooFilterBuilder::suggest_size_class_from_bytes(0).log(), 0);
    /// assert_eq!(TaffyCuckooFilterBuilder::suggest_size_class_from_bytes(1023).log(), 6);
    /// assert_eq!(TaffyCuckooFilterBuilder::suggest_size_class_from_bytes(1024).log(), 7);
    /// ```
    pub fn suggest_size_class_from_bytes(bytes: u64) -> SizeClass {
        let buckets = (bytes / BUCKET_BYTES).max(1);
        clamp_log(buckets.ilog2())
    }

    /// Suggests the smallest size class holding `ndv` values at a 95% load factor.
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilterBuilder;
    /// assert_eq!(TaffyCuckooFilterBuilder::suggest_size_class_from_ndv(0).log(), 0);
    /// assert_eq!(TaffyCuckooFilterBuilder::suggest_size_class_from_ndv(3).log(), 0);
    /// assert_eq!(TaffyCuckooFilterBuilder::suggest_size_class_from_ndv(1_000_000).log(), 19);
    /// ```
    pub fn suggest_size_class_from_ndv(ndv: u64) -> SizeClass {
        let buckets = (ndv as f64 / (BUCKET_SIZE as f64 * TARGET_LOAD_FACTOR)).ceil() as u64;
        let buckets = buckets.max(1).checked_next_power_of_two().unwrap_or(u64::MAX);
        clamp_log(buckets.trailing_zeros())
    }
}

fn clamp_log(log: u32) -> SizeClass {
    let log = log.min(u32::from(SizeClass::MAX.log())) as u8;
    SizeClass::new(log).unwrap_or(SizeClass::MAX)
}
