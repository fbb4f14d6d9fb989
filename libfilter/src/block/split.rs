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

/// Words per block.
const BLOCK_WORDS: usize = 8;

/// Bits per block word.
const WORD_BITS: u32 = u32::BITS;

/// Upper bound on blocks, so that `(hash >> 32) * num_blocks` never overflows.
pub(crate) const MAX_BLOCKS: u64 = 1 << 32;

/// Beyond this many values per block, every lookup is a false positive in practice.
const SATURATED_LOAD: f64 = 500.0;

/// Odd multipliers picking one bit in each block word.
const SALTS: [u32; BLOCK_WORDS] = [
    0x47b6_137b,
    0x4497_4d91,
    0x8824_ad5b,
    0xa2b7_289d,
    0x7054_95c7,
    0x2df1_424b,
    0x9efc_4947,
    0x5c6b_fb31,
];

type Block = [u32; BLOCK_WORDS];

/// A fixed-size split block Bloom filter over caller-supplied hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SplitBlockFilter {
    blocks: Vec<Block>,
}

impl SplitBlockFilter {
    /// Creates the smallest filter whose false positive probability after `ndv` distinct inserts
    /// is at most `fpp`.
    pub(crate) fn with_ndv_fpp(ndv: u64, fpp: f64) -> Self {
        let num_blocks = suggest_num_blocks(ndv, fpp);
        SplitBlockFilter {
            blocks: vec![[0; BLOCK_WORDS]; num_blocks as usize],
        }
    }

    pub(crate) fn insert_hash(&mut self, hash: u64) {
        let index = block_index(hash, self.blocks.len());
        let mask = mask(hash);
        for (word, bit) in self.blocks[index].iter_mut().zip(mask) {
            *word |= bit;
        }
    }

    pub(crate) fn contains_hash(&self, hash: u64) -> bool {
        let block = &self.blocks[block_index(hash, self.blocks.len())];
        block
            .iter()
            .zip(mask(hash))
            .fold(true, |found, (&word, bit)| found & (word & bit != 0))
    }

    pub(crate) fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn size_in_bytes(&self) -> usize {
        std::mem::size_of_val(self.blocks.as_slice())
    }
}

/// Returns the smallest number of blocks that keeps `ndv` values under `fpp`.
///
/// Clamped to `1..=MAX_BLOCKS`.
pub(crate) fn suggest_num_blocks(ndv: u64, fpp: f64) -> u64 {
    if fpp_with_blocks(ndv, MAX_BLOCKS) > fpp {
        return MAX_BLOCKS;
    }
    // Invariant: `hi` is enough, `lo` is not.
    let (mut lo, mut hi) = (0, MAX_BLOCKS);
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fpp_with_blocks(ndv, mid) <= fpp {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

/// Expected false positive probability of `num_blocks` blocks holding `ndv` distinct values.
///
/// The values in one block follow a Poisson distribution with mean `ndv / num_blocks`; a block
/// holding `k` values sets a given word bit with probability `1 - (31/32)^k`, and a lookup needs
/// all eight of its bits set.
pub(crate) fn fpp_with_blocks(ndv: u64, num_blocks: u64) -> f64 {
    let load = ndv as f64 / num_blocks as f64;
    if load > SATURATED_LOAD {
        return 1.0;
    }
    let word_miss = 1.0 - 1.0 / f64::from(WORD_BITS);
    let last = (load + 12.0 * load.sqrt() + 30.0).ceil() as u32;

    let mut poisson = (-load).exp();
    let mut fpp = 0.0;
    for k in 0..=last {
        fpp += poisson * (1.0 - word_miss.powi(k as i32)).powi(BLOCK_WORDS as i32);
        poisson *= load / f64::from(k + 1);
    }
    fpp.min(1.0)
}

/// Picks a block from the high half of the hash.
fn block_index(hash: u64, num_blocks: usize) -> usize {
    (((hash >> 32) * num_blocks as u64) >> 32) as usize
}

/// Sets one bit per word, picked from the low half of the hash.
fn mask(hash: u64) -> Block {
    let low = hash as u32;
    SALTS.map(|salt| 1 << (low.wrapping_mul(salt) >> (WORD_BITS - 5)))
}
