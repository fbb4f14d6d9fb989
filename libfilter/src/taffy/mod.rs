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

//! Growable cuckoo filters for approximate membership queries over 64-bit hashes.
//!
//! A taffy cuckoo filter stores a short fingerprint of every inserted hash in one of two
//! candidate buckets. Unlike a classic cuckoo filter it has no fixed capacity: when an insertion
//! cannot find room, the bucket table doubles and every stored fingerprint moves to its new home
//! using only the address bits it kept at insertion time. The original keys are never needed.
//!
//! # Properties
//!
//! - **No false negatives**: after `insert_hash(h)` succeeds, `contains_hash(h)` is `true` for
//!   the filter, its clones, its unions, its frozen form and its serialized copies
//! - **Possible false positives**: about `2 * 4 / 2^10`, growing slowly as the table grows
//!   past the size at which a fingerprint runs out of spare address bits
//! - **Growable**: a filter can start with a single bucket
//! - **Caller-supplied hashes**: the filter never hashes keys itself
//!
//! # Usage
//!
//! ```rust
//! use libfilter::taffy::TaffyCuckooFilter;
//!
//! let mut filter = TaffyCuckooFilter::with_ndv_fpp(1_000_000, 0.01);
//! filter.insert_hash(0x1234).unwrap();
//!
//! assert!(filter.contains_hash(0x1234));
//! println!("Size class: {}", filter.size_class().log());
//! println!("Load factor: {:.3}", filter.load_factor());
//! ```
//!
//! # Creating Filters
//!
//! ```rust
//! # use libfilter::taffy::TaffyCuckooFilterBuilder;
//! // Largest table that fits in 64 KiB
//! let filter = TaffyCuckooFilterBuilder::with_bytes(64 << 10).build();
//!
//! // Sized for 10k distinct hashes, with a custom kick budget
//! let filter = TaffyCuckooFilterBuilder::with_ndv_fpp(10_000, 0.01)
//!     .max_kicks(100)
//!     .build();
//! # assert_eq!(filter.max_kicks(), 100);
//! ```
//!
//! # Set Operations
//!
//! ```rust
//! # use libfilter::taffy::TaffyCuckooFilter;
//! let mut x = TaffyCuckooFilter::with_bytes(0);
//! let mut y = TaffyCuckooFilter::with_bytes(4096);
//! x.insert_hash(7).unwrap();
//! y.insert_hash(11).unwrap();
//!
//! let z = x.union(&y).unwrap();
//! assert!(z.contains_hash(7) && z.contains_hash(11));
//!
//! let frozen = z.freeze();
//! assert!(frozen.contains_hash(7) && frozen.contains_hash(11));
//! ```
//!
//! # Implementation Details
//!
//! - 16-bit slots: a 10-bit fingerprint and up to 5 spare address bits
//! - Four slots per bucket, `2^log` buckets for a [`SizeClass`] of `log`
//! - Bounded eviction walk, rolled back in full when it runs dry
//! - Versionless little-endian serialization format (family ID: 1)
//!
//! # References
//!
//! - Fan, Andersen, Kaminsky and Mitzenmacher (2014). "Cuckoo Filter: Practically Better Than
//!   Bloom"
//! - Apple, Jim (2022). "Stretching your data with taffy filters"

mod builder;
mod filter;
mod frozen;
mod serialization;
mod size_class;
mod slot;
mod table;
mod union;

pub use self::builder::DEFAULT_MAX_KICKS;
pub use self::builder::TaffyCuckooFilterBuilder;
pub use self::filter::TaffyCuckooFilter;
pub use self::frozen::FrozenTaffyCuckooFilter;
pub use self::size_class::SizeClass;
