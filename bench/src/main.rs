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

//! Benchmark of taffy filter insert time, lookup time and false positive probability.
//!
//! Results are written to stdout as CSV rows of the form
//! `filter_name,ndv_start,ndv_finish,bytes,sample_type,payload`. Logs go to stderr and are
//! controlled by `RUST_LOG`.

mod harness;
mod sample;

use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use libfilter::error::Error;
use libfilter::error::ErrorKind;
use tracing::Level;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::harness::TaffyBlock;
use crate::harness::TaffyCuckoo;
use crate::harness::Workload;
use crate::harness::bench_frozen;
use crate::harness::bench_help;

/// Benchmarks taffy filters
#[derive(Parser, Debug)]
#[command(name = "libfilter-bench", version)]
struct Cli {
    /// Number of distinct hashes to insert
    #[arg(long)]
    ndv: u64,

    /// Timed repetitions per sample
    #[arg(long)]
    reps: u64,

    /// Byte budget of the fixed-size filters
    #[arg(long)]
    bytes: u64,

    /// Target false positive probability of the block filter baseline
    #[arg(long = "block_fpp")]
    block_fpp: f64,

    /// Target false positive probability of the taffy block filter
    #[arg(long = "taffy_fpp")]
    taffy_fpp: f64,

    /// Print the CSV header before any sample
    #[arg(long = "print_header")]
    print_header: bool,
}

impl Cli {
    /// Rejects zero counts and probabilities outside (0, 1].
    fn validate(&self) -> Result<(), Error> {
        for (flag, value) in [("ndv", self.ndv), ("reps", self.reps), ("bytes", self.bytes)] {
            if value == 0 {
                return Err(Error::new(ErrorKind::InvalidArgument, "must be positive")
                    .with_context("flag", flag));
            }
        }
        for (flag, value) in [("block_fpp", self.block_fpp), ("taffy_fpp", self.taffy_fpp)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(
                    Error::new(ErrorKind::InvalidArgument, "must be in (0, 1]")
                        .with_context("flag", flag)
                        .with_context("value", value),
                );
            }
        }
        Ok(())
    }
}

fn run(cli: &Cli) -> io::Result<()> {
    let mut rng = rand::thread_rng();
    // A run whose filter fills up truncates the hashes for every later run.
    let mut workload = Workload::random(cli.ndv, &mut rng);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if cli.print_header {
        writeln!(out, "{}", sample::HEADER)?;
    }

    for rep in 0..cli.reps {
        info!(rep, "starting repetition");

        let mut filter = TaffyCuckoo::with_bytes(cli.bytes);
        bench_help(&mut out, cli.reps, &mut workload, &mut filter, &mut rng)?;

        let mut filter = TaffyBlock::with_fpp(cli.taffy_fpp);
        bench_help(&mut out, cli.reps, &mut workload, &mut filter, &mut rng)?;

        bench_frozen(&mut out, cli.reps, &workload, cli.bytes, &mut rng)?;
        out.flush()?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
            ) {
                err.exit();
            }
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = cli.validate() {
        error!(%err, "invalid arguments");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "failed to write samples");
            ExitCode::FAILURE
        }
    }
}
