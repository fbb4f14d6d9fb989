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

/// The size class of a taffy cuckoo filter: the log2 of its bucket count.
///
/// The size class fixes how many leading bits of a hash select a bucket. It only ever grows over
/// the lifetime of a mutable filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    /// A single bucket.
    pub const MIN: SizeClass = SizeClass(0);

    /// The largest supported size class.
    ///
    /// Fingerprints are cut from the low bits of a hash while addresses and tails come from the
    /// high bits, so the two regions must not overlap.
    pub const MAX: SizeClass = SizeClass(48);

    /// Creates a size class from the log2 of the bucket count.
    ///
    /// Returns `None` if `log` exceeds [`SizeClass::MAX`].
    pub fn new(log: u8) -> Option<SizeClass> {
        if log <= Self::MAX.0 {
            Some(SizeClass(log))
        } else {
            None
        }
    }

    /// Returns the log2 of the bucket count.
    pub fn log(self) -> u8 {
        self.0
    }

    /// Returns the bucket count, `2^log`.
    pub fn num_buckets(self) -> u64 {
        1 << self.0
    }

    pub(crate) fn next(self) -> Option<SizeClass> {
        Self::new(self.0 + 1)
    }

    pub(crate) fn prev(self) -> Option<SizeClass> {
        self.0.checked_sub(1).map(SizeClass)
    }
}
