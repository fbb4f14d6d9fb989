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

use super::TaffyCuckooFilter;
use super::filter::Placement;
use super::slot::Entry;
use crate::error::Error;

impl TaffyCuckooFilter {
    /// Builds a new filter reporting every hash that either operand reports.
    ///
    /// The operand with the smaller size class has its fingerprints regrown to the larger size
    /// class and placed into a copy of the other, growing the copy further whenever an eviction
    /// walk runs out of kicks. Neither operand is modified.
    ///
    /// For every hash `h`, `union.contains_hash(h) == self.contains_hash(h) ||
    /// other.contains_hash(h)`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InsertExhausted`](crate::error::ErrorKind::InsertExhausted) if the
    /// result would need to grow past [`SizeClass::MAX`](super::SizeClass::MAX).
    ///
    /// # Examples
    ///
    /// ```
    /// # use libfilter::taffy::TaffyCuckooFilter;
    /// let mut x = TaffyCuckooFilter::with_bytes(0);
    /// let mut y = TaffyCuckooFilter::with_bytes(0);
    /// x.insert_hash(1).unwrap();
    /// y.insert_hash(2).unwrap();
    ///
    /// let z = x.union(&y).unwrap();
    /// assert!(z.contains_hash(1));
    /// assert!(z.contains_hash(2));
    /// ```
    pub fn union(&self, other: &TaffyCuckooFilter) -> Result<TaffyCuckooFilter, Error> {
        let (larger, smaller) = if self.size_class() >= other.size_class() {
            (self, other)
        } else {
            (other, self)
        };

        let mut result = larger.clone();
        let mut pending: Vec<Entry> = smaller.table.entries().collect();
        for _ in smaller.size_class().log()..result.size_class().log() {
            pending = grow_entries(&pending);
        }

        let mut next = 0;
        while next < pending.len() {
            let entry = pending[next];
            let size_class = result.size_class();
            if result.table.holds(entry) || result.table.holds(entry.alternate(size_class)) {
                next += 1;
                continue;
            }
            match result.place(entry) {
                Placement::Placed { .. } => next += 1,
                Placement::Exhausted => {
                    result.grow()?;
                    pending = grow_entries(&pending[next..]);
                    next = 0;
                }
            }
        }

        debug!(
            left = self.size_class().log(),
            right = other.size_class().log(),
            result = result.size_class().log(),
            num_tags = result.num_tags(),
            "merged taffy cuckoo filters"
        );
        Ok(result)
    }
}

fn grow_entries(entries: &[Entry]) -> Vec<Entry> {
    entries.iter().flat_map(|entry| entry.grow()).collect()
}

#[cfg(test)]
mod tests {
    use crate::taffy::TaffyCuckooFilter;

    fn spread(i: u64) -> u64 {
        i.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0x5555
    }

    #[test]
    fn test_union_with_self_is_identity() {
        let mut x = TaffyCuckooFilter::with_bytes(0);
        for i in 0..300 {
            x.insert_hash(spread(i)).unwrap();
        }
        assert_eq!(x.union(&x).unwrap(), x);
    }

    #[test]
    fn test_union_with_empty() {
        let mut x = TaffyCuckooFilter::with_bytes(0);
        for i in 0..300 {
            x.insert_hash(spread(i)).unwrap();
        }
        let empty = TaffyCuckooFilter::with_bytes(0);
        assert_eq!(x.union(&empty).unwrap(), x);

        let z = empty.union(&x).unwrap();
        for i in 0..300 {
            assert!(z.contains_hash(spread(i)));
        }
    }

    #[test]
    fn test_union_does_not_mutate_operands() {
        let mut x = TaffyCuckooFilter::with_bytes(0);
        let mut y = TaffyCuckooFilter::with_bytes(1 << 12);
        for i in 0..100 {
            x.insert_hash(spread(i)).unwrap();
            y.insert_hash(spread(i + 1000)).unwrap();
        }
        let (x0, y0) = (x.clone(), y.clone());
        let z = x.union(&y).unwrap();
        assert_eq!(x, x0);
        assert_eq!(y, y0);
        assert_eq!(z.size_class(), y.size_class());
        for i in 0..100 {
            assert!(z.contains_hash(spread(i)));
            assert!(z.contains_hash(spread(i + 1000)));
        }
    }
}
