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

use std::fmt;

/// Header line matching [`Sample`]'s `Display` output.
pub const HEADER: &str = "filter_name,ndv_start,ndv_finish,bytes,sample_type,payload";

/// What a [`Sample`]'s payload measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Mean nanoseconds per insertion over the `ndv_start..ndv_finish` prefix.
    InsertNanos,
    /// Mean nanoseconds per lookup of an absent hash.
    FindMissingNanos,
    /// Mean nanoseconds per lookup of an inserted hash.
    FindPresentNanos,
    /// Mean nanoseconds to draw an absent hash without looking it up.
    ToFinBase,
    /// Mean nanoseconds to draw an inserted hash without looking it up.
    ToInsBase,
    /// Fraction of absent hashes reported present.
    Fpp,
}

impl SampleType {
    pub const fn into_static(self) -> &'static str {
        match self {
            SampleType::InsertNanos => "insert_nanos",
            SampleType::FindMissingNanos => "find_missing_nanos",
            SampleType::FindPresentNanos => "find_present_nanos",
            SampleType::ToFinBase => "to_fin_base",
            SampleType::ToInsBase => "to_ins_base",
            SampleType::Fpp => "fpp",
        }
    }
}

/// One CSV row of benchmark output.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub filter_name: &'static str,
    pub ndv_start: u64,
    pub ndv_finish: u64,
    pub bytes: u64,
    pub sample_type: SampleType,
    pub payload: f64,
}

impl Sample {
    pub fn new(filter_name: &'static str) -> Self {
        Sample {
            filter_name,
            ndv_start: 0,
            ndv_finish: 0,
            bytes: 0,
            sample_type: SampleType::InsertNanos,
            payload: 0.0,
        }
    }

    /// Returns a copy of this sample carrying another measurement.
    pub fn with(&self, sample_type: SampleType, payload: f64) -> Self {
        Sample {
            sample_type,
            payload,
            ..self.clone()
        }
    }
}

/// Wraps a string in double quotes, doubling any quote inside it.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            Quoted(self.filter_name),
            self.ndv_start,
            self.ndv_finish,
            self.bytes,
            Quoted(self.sample_type.into_static()),
            self.payload
        )
    }
}
