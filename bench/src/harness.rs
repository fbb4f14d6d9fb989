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

use std::hint::black_box;
use std::io;
use std::io::Write;
use std::time::Duration;
use std::time::Instant;

use libfilter::block::TaffyBlockFilter;
use libfilter::taffy::FrozenTaffyCuckooFilter;
use libfilter::taffy::TaffyCuckooFilter;
use rand::Rng;
use tracing::debug;
use tracing::warn;

use crate::sample::Sample;
use crate::sample::SampleType;

/// Default lookups per timed run.
const LOOKUPS: u64 = 1000 * 1000;

/// Prefix growth between insert samples.
pub const GROWTH_FACTOR: f64 = 1.05;

/// A filter the harness can time.
pub trait BenchFilter {
    /// Name printed in the `filter_name` column.
    const NAME: &'static str;

    /// Inserts a hash, returning `false` if the filter is full.
    fn insert_hash(&mut self, hash: u64) -> bool;

    /// Returns whether the hash is possibly in the filter.
    fn find_hash(&self, hash: u64) -> bool;

    /// Current storage footprint, reported in the `bytes` column.
    fn size_in_bytes(&self) -> u64;
}

/// A taffy cuckoo filter created from a byte budget.
pub struct TaffyCuckoo(pub TaffyCuckooFilter);

impl TaffyCuckoo {
    pub fn with_bytes(bytes: u64) -> Self {
        TaffyCuckoo(TaffyCuckooFilter::with_bytes(bytes))
    }
}

impl BenchFilter for TaffyCuckoo {
    const NAME: &'static str = "TaffyCuckoo";

    fn insert_hash(&mut self, hash: u64) -> bool {
        insert_or_warn(&mut self.0, hash)
    }

    fn find_hash(&self, hash: u64) -> bool {
        self.0.contains_hash(hash)
    }

    fn size_in_bytes(&self) -> u64 {
        self.0.size_in_bytes() as u64
    }
}

/// A taffy block filter that starts at 32 distinct values and grows through the whole run.
pub struct TaffyBlock(pub TaffyBlockFilter);

impl TaffyBlock {
    pub fn with_fpp(fpp: f64) -> Self {
        TaffyBlock(TaffyBlockFilter::with_ndv_fpp(32, fpp))
    }
}

impl BenchFilter for TaffyBlock {
    const NAME: &'static str = "TaffyBlock";

    fn insert_hash(&mut self, hash: u64) -> bool {
        self.0.insert_hash(hash);
        true
    }

    fn find_hash(&self, hash: u64) -> bool {
        self.0.contains_hash(hash)
    }

    fn size_in_bytes(&self) -> u64 {
        self.0.size_in_bytes() as u64
    }
}

fn insert_or_warn(filter: &mut TaffyCuckooFilter, hash: u64) -> bool {
    match filter.insert_hash(hash) {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, "insert failed, truncating the run");
            false
        }
    }
}

/// Hashes for one benchmark run.
pub struct Workload {
    /// Hashes to insert. Truncated if a filter fills up.
    pub to_insert: Vec<u64>,
    /// Hashes that were never inserted, at least `lookups` of them.
    pub to_find: Vec<u64>,
    /// Lookups per timed run.
    pub lookups: u64,
}

impl Workload {
    pub fn random(ndv: u64, rng: &mut impl Rng) -> Self {
        Self::with_lookups(ndv, LOOKUPS, rng)
    }

    pub fn with_lookups(ndv: u64, lookups: u64, rng: &mut impl Rng) -> Self {
        let to_insert = (0..ndv).map(|_| rng.gen()).collect();
        let to_find = (0..ndv.max(lookups)).map(|_| rng.gen()).collect();
        Workload {
            to_insert,
            to_find,
            lookups,
        }
    }
}

/// Times the filter on geometrically growing prefixes of `to_insert`.
///
/// After each prefix it writes the insert time, `reps` rounds of lookup timings for absent and
/// present hashes, and the false positive probability.
pub fn bench_help<F: BenchFilter>(
    out: &mut impl Write,
    reps: u64,
    workload: &mut Workload,
    filter: &mut F,
    rng: &mut impl Rng,
) -> io::Result<()> {
    let mut base = Sample::new(F::NAME);
    let mut last = 0.0f64;
    let mut next = 1.0f64;

    while (last as usize) < workload.to_insert.len() {
        let start = Instant::now();
        let end = workload.to_insert.len().min(next as usize);
        for i in last as usize..end {
            if !filter.insert_hash(workload.to_insert[i]) {
                next = i as f64;
                workload.to_insert.truncate(i);
                break;
            }
        }
        let insert_time = start.elapsed();

        base.ndv_start = last as u64;
        base.ndv_finish = workload.to_insert.len().min(next as usize) as u64;
        if base.ndv_finish > base.ndv_start {
            base.bytes = filter.size_in_bytes();
            let inserted = base.ndv_finish - base.ndv_start;
            let per_insert = nanos(insert_time) / inserted as f64;
            writeln!(out, "{}", base.with(SampleType::InsertNanos, per_insert))?;

            let prefix = base.ndv_finish;
            find_samples(out, reps, &base, prefix, workload, |h| filter.find_hash(h), rng)?;
        }

        let previous = last;
        last = next;
        next = previous * GROWTH_FACTOR + 1.0;
    }

    debug!(filter = F::NAME, bytes = filter.size_in_bytes(), "finished run");
    Ok(())
}

/// Times lookups of a frozen filter built from the whole workload.
///
/// Frozen filters cannot be inserted into, so they get one round of lookup samples covering
/// every inserted hash.
pub fn bench_frozen(
    out: &mut impl Write,
    reps: u64,
    workload: &Workload,
    bytes: u64,
    rng: &mut impl Rng,
) -> io::Result<()> {
    let mut source = TaffyCuckoo::with_bytes(bytes);
    let mut inserted = 0;
    for &hash in &workload.to_insert {
        if !source.insert_hash(hash) {
            break;
        }
        inserted += 1;
    }
    if inserted == 0 {
        return Ok(());
    }
    let frozen: FrozenTaffyCuckooFilter = source.0.freeze();

    let mut base = Sample::new("FrozenTaffyCuckoo");
    base.ndv_finish = inserted;
    base.bytes = frozen.size_in_bytes() as u64;
    find_samples(out, reps, &base, inserted, workload, |h| frozen.contains_hash(h), rng)?;

    debug!(
        source_bytes = source.size_in_bytes(),
        frozen_bytes = base.bytes,
        "finished frozen run"
    );
    Ok(())
}

fn find_samples(
    out: &mut impl Write,
    reps: u64,
    base: &Sample,
    prefix: u64,
    workload: &Workload,
    find: impl Fn(u64) -> bool,
    rng: &mut impl Rng,
) -> io::Result<()> {
    let Workload {
        to_insert,
        to_find,
        lookups,
    } = workload;
    let lookups = *lookups;
    let per_lookup = |duration: Duration| nanos(duration) / lookups as f64;

    // Lookup results and drawn hashes are summed so the timed loops cannot be elided.
    let mut found = 0u64;
    let mut drawn = 0u64;
    let mut found_monotonic = 0u64;

    for _ in 0..reps {
        let (find_time, base_time) = timed_lookups(
            rng,
            lookups,
            prefix,
            |i| found += u64::from(find(to_find[i])),
            |i| drawn = drawn.wrapping_add(to_find[i]),
        );
        let missing = base.with(SampleType::FindMissingNanos, per_lookup(find_time));
        writeln!(out, "{missing}")?;
        writeln!(out, "{}", base.with(SampleType::ToFinBase, per_lookup(base_time)))?;

        for &hash in &to_find[..lookups as usize] {
            found_monotonic += u64::from(find(hash));
        }
    }

    let fpp = found_monotonic as f64 / lookups as f64 / reps as f64;
    writeln!(out, "{}", base.with(SampleType::Fpp, fpp))?;

    for _ in 0..reps {
        let (find_time, base_time) = timed_lookups(
            rng,
            lookups,
            prefix,
            |i| found += u64::from(find(to_insert[i])),
            |i| drawn = drawn.wrapping_add(to_insert[i]),
        );
        let present = base.with(SampleType::FindPresentNanos, per_lookup(find_time));
        writeln!(out, "{present}")?;
        writeln!(out, "{}", base.with(SampleType::ToInsBase, per_lookup(base_time)))?;
    }

    let _ = black_box((found, drawn));
    Ok(())
}

/// Runs `lookups` random-index calls of `lookup`, then as many of `baseline`, and returns both
/// durations.
fn timed_lookups(
    rng: &mut impl Rng,
    lookups: u64,
    prefix: u64,
    mut lookup: impl FnMut(usize),
    mut baseline: impl FnMut(usize),
) -> (Duration, Duration) {
    let start = Instant::now();
    for _ in 0..lookups {
        lookup(rng.gen_range(0..prefix) as usize);
    }
    let middle = Instant::now();
    for _ in 0..lookups {
        baseline(rng.gen_range(0..prefix) as usize);
    }
    (middle - start, middle.elapsed())
}

fn nanos(duration: Duration) -> f64 {
    duration.as_nanos() as f64
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;

    #[test]
    fn test_bench_help_covers_every_prefix() {
        let mut rng = StepRng::new(1, 0x9E37_79B9_7F4A_7C15);
        let mut workload = Workload::with_lookups(50, 1000, &mut rng);
        let mut filter = TaffyBlock::with_fpp(0.01);
        let mut out = Vec::new();
        bench_help(&mut out, 1, &mut workload, &mut filter, &mut rng).unwrap();

        let out = String::from_utf8(out).unwrap();
        let inserts: Vec<&str> = out
            .lines()
            .filter(|line| line.contains("\"insert_nanos\""))
            .collect();
        assert!(inserts[0].starts_with("\"TaffyBlock\",0,1,"));
        assert!(inserts.last().unwrap().contains(",50,"));
        assert!(out.lines().all(|line| line.split(',').count() == 6));
        assert!(workload.to_insert.iter().all(|&h| filter.find_hash(h)));
    }

    #[test]
    fn test_bench_frozen_reports_find_samples_only() {
        let mut rng = StepRng::new(7, 0xA24B_AED4_963E_E407);
        let workload = Workload::with_lookups(100, 1000, &mut rng);
        let mut out = Vec::new();
        bench_frozen(&mut out, 2, &workload, 1024, &mut rng).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 2 * 2 + 1 + 2 * 2);
        assert!(out.lines().all(|line| line.starts_with("\"FrozenTaffyCuckoo\",0,100,")));
        assert!(!out.contains("insert_nanos"));
    }
}
