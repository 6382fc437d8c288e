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

//! Byte sink and capacity-checked byte source used by sketch serialization.
//!
//! All multi-byte values are little-endian.

use std::io;
use std::io::Cursor;
use std::io::Read;

use byteorder::ByteOrder;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;

pub(crate) mod family;

pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    pub fn write_u16_le(&mut self, n: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, n);
        self.write(&buf);
    }

    pub fn write_u32_le(&mut self, n: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, n);
        self.write(&buf);
    }

    pub fn write_u64_le(&mut self, n: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, n);
        self.write(&buf);
    }

    pub fn write_i64_le(&mut self, n: i64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_i64(&mut buf, n);
        self.write(&buf);
    }

    pub fn write_f32_le(&mut self, n: f32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, n);
        self.write(&buf);
    }

    pub fn write_f64_le(&mut self, n: f64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_f64(&mut buf, n);
        self.write(&buf);
    }
}

pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl<'a> SketchSlice<'a> {
    pub fn new(slice: &'a [u8]) -> SketchSlice<'a> {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        let total = self.slice.get_ref().len() as u64;
        total.saturating_sub(self.slice.position()) as usize
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.slice.read_u8()
    }

    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        self.slice.read_u16::<LittleEndian>()
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.slice.read_u32::<LittleEndian>()
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        self.slice.read_u64::<LittleEndian>()
    }

    pub fn read_i64_le(&mut self) -> io::Result<i64> {
        self.slice.read_i64::<LittleEndian>()
    }

    pub fn read_f32_le(&mut self) -> io::Result<f32> {
        self.slice.read_f32::<LittleEndian>()
    }

    pub fn read_f64_le(&mut self) -> io::Result<f64> {
        self.slice.read_f64::<LittleEndian>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut bytes = SketchBytes::with_capacity(16);
        bytes.write_u16_le(0x0102);
        bytes.write_u64_le(7);
        let bytes = bytes.into_bytes();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..2], &[0x02, 0x01]);

        let mut slice = SketchSlice::new(&bytes);
        assert_eq!(slice.read_u16_le().unwrap(), 0x0102);
        assert_eq!(slice.remaining(), 8);
        assert_eq!(slice.read_u64_le().unwrap(), 7);
        assert_eq!(slice.remaining(), 0);
        assert!(slice.read_u8().is_err());
    }
}
