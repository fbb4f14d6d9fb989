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

//! # libfilter
//!
//! Approximate membership query filters over caller-supplied 64-bit hashes.
//!
//! The [`taffy`] module provides growable cuckoo filters: they start with a single bucket,
//! double on demand without access to the original keys, and support union, freezing into a
//! compact read-only form, and a byte-exact serialization format.
//!
//! The [`block`] module provides [`TaffyBlockFilter`](block::TaffyBlockFilter), which grows by
//! stacking block Bloom filters and keeps its false positive probability under a fixed target.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod block;
pub mod error;
pub mod taffy;

mod codec;
