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

//! Wire constants for the classic quantiles sketch image (serial version 3).
//!
//! The preamble is one long for an empty sketch and two otherwise; see
//! `Family::QUANTILES`.

pub const SERIAL_VERSION: u8 = 3;

pub const FLAG_READ_ONLY: u8 = 1 << 1;
pub const FLAG_EMPTY: u8 = 1 << 2;
pub const FLAG_COMPACT: u8 = 1 << 3;
pub const FLAG_ORDERED: u8 = 1 << 4;
pub const ALLOWED_FLAGS: u8 = FLAG_READ_ONLY | FLAG_EMPTY | FLAG_COMPACT | FLAG_ORDERED;

/// Bytes before the first item of a non-empty image: the preamble plus `n`.
pub const DATA_START: usize = 16;
pub const EMPTY_SIZE_BYTES: usize = 8;
