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

//! Per-item codecs used by sketch serialization.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;

/// Item types that [`ItemsSketch`](super::ItemsSketch) can serialize.
pub(crate) trait QuantilesItem: Clone {
    /// Serialized size in bytes.
    fn serialized_size(value: &Self) -> usize;

    /// Serialize a single item into the buffer.
    fn serialize(value: &Self, bytes: &mut SketchBytes);

    /// Deserialize a single item from the input.
    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error>;
}

impl QuantilesItem for f32 {
    fn serialized_size(_value: &Self) -> usize {
        4
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_f32_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_f32_le()
            .map_err(|_| Error::insufficient_data("f32"))
    }
}

impl QuantilesItem for f64 {
    fn serialized_size(_value: &Self) -> usize {
        8
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_f64_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_f64_le()
            .map_err(|_| Error::insufficient_data("f64"))
    }
}

impl QuantilesItem for i64 {
    fn serialized_size(_value: &Self) -> usize {
        8
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_i64_le(*value);
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        input
            .read_i64_le()
            .map_err(|_| Error::insufficient_data("i64"))
    }
}

impl QuantilesItem for String {
    fn serialized_size(value: &Self) -> usize {
        4 + value.len()
    }

    fn serialize(value: &Self, bytes: &mut SketchBytes) {
        bytes.write_u32_le(value.len() as u32);
        bytes.write(value.as_bytes());
    }

    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
        let len = input
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("string_len"))? as usize;
        if len > input.remaining() {
            return Err(Error::insufficient_data("string_bytes"));
        }
        let mut buf = vec![0u8; len];
        input
            .read_exact(&mut buf)
            .map_err(|_| Error::insufficient_data("string_bytes"))?;
        String::from_utf8(buf).map_err(|err| Error::deserial("invalid utf-8 string").set_source(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_string_codec() {
        let mut bytes = SketchBytes::with_capacity(16);
        let value = "héllo".to_string();
        String::serialize(&value, &mut bytes);
        let bytes = bytes.into_bytes();
        assert_eq!(bytes.len(), String::serialized_size(&value));

        let mut input = SketchSlice::new(&bytes);
        assert_eq!(String::deserialize(&mut input).unwrap(), value);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_truncated_string() {
        let bytes = [10u8, 0, 0, 0, b'a', b'b'];
        let err = String::deserialize(&mut SketchSlice::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes = [2u8, 0, 0, 0, 0xff, 0xfe];
        let err = String::deserialize(&mut SketchSlice::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert!(err.message().contains("utf-8"));
    }

    #[test]
    fn test_truncated_scalar() {
        let bytes = [1u8, 2, 3];
        let err = i64::deserialize(&mut SketchSlice::new(&bytes)).unwrap_err();
        assert!(err.message().contains("i64"));
    }
}
