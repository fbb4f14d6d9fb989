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

//! Growable block filters.
//!
//! A [`TaffyBlockFilter`] is a stack of split block Bloom filters. Each level is sized for twice
//! the distinct values of the level below it and half its false positive probability, so the
//! filter grows without bound while its false positive probability stays under the target given
//! at construction.
//!
//! Every level is a split block Bloom filter: an array of 32-byte blocks, each made of eight
//! 32-bit words. A hash picks one block and sets exactly one bit in each of its words, so
//! lookups touch a single cache line per level.
//!
//! # Usage
//!
//! ```rust
//! use libfilter::block::TaffyBlockFilter;
//!
//! let mut filter = TaffyBlockFilter::with_ndv_fpp(32, 0.01);
//! for hash in 0..1000u64 {
//!     filter.insert_hash(hash.wrapping_mul(0x9E37_79B9_7F4A_7C15));
//! }
//! assert!(filter.num_levels() > 1);
//! assert!(filter.contains_hash(7u64.wrapping_mul(0x9E37_79B9_7F4A_7C15)));
//! ```
//!
//! # References
//!
//! - Putze, Felix; Sanders, Peter; Singler, Johannes (2007), "Cache-, Hash- and Space-Efficient
//!   Bloom Filters"
//! - Apple, Jim (2022), "Stretching Your Data With Taffy Filters"

mod filter;
mod split;

pub use self::filter::TaffyBlockFilter;
