// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Serde helpers for document field encodings
//!
//! Byte values are written as fixed width upper case hex, byte arrays as
//! unseparated upper case hex, record sizes as zero-padded decimal.

use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

/// Values encoded as hex strings in documents
pub trait HexField: Sized {
    fn encode_hex(&self) -> String;

    fn decode_hex(s: &str) -> Result<Self, String>;
}

impl HexField for u8 {
    fn encode_hex(&self) -> String {
        format!("{self:02X}")
    }

    fn decode_hex(s: &str) -> Result<Self, String> {
        u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte '{s}': {e}"))
    }
}

impl HexField for u16 {
    fn encode_hex(&self) -> String {
        format!("{self:04X}")
    }

    fn decode_hex(s: &str) -> Result<Self, String> {
        u16::from_str_radix(s, 16).map_err(|e| format!("invalid hex value '{s}': {e}"))
    }
}

impl HexField for Vec<u8> {
    fn encode_hex(&self) -> String {
        hex::encode_upper(self)
    }

    fn decode_hex(s: &str) -> Result<Self, String> {
        hex::decode(s).map_err(|e| format!("invalid hex string '{s}': {e}"))
    }
}

/// Mandatory hex field
pub mod hex_value {
    use super::*;

    pub fn serialize<T: HexField, S: Serializer>(v: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.encode_hex())
    }

    pub fn deserialize<'de, T: HexField, D: Deserializer<'de>>(d: D) -> Result<T, D::Error> {
        let s = String::deserialize(d)?;
        T::decode_hex(&s).map_err(D::Error::custom)
    }
}

/// Optional hex field, absent or `null` values decode to `None`
pub mod hex_opt {
    use super::*;

    pub fn serialize<T: HexField, S: Serializer>(v: &Option<T>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_str(&v.encode_hex()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: HexField, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<T>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => T::decode_hex(&s).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

/// Optional zero-padded decimal field (`0029`)
pub mod dec_padded {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<u16>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_str(&format!("{v:04}")),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => s
                .parse::<u16>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid decimal '{s}': {e}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_fields() {
        assert_eq!(0x1Fu8.encode_hex(), "1F");
        assert_eq!(0x0Au16.encode_hex(), "000A");
        assert_eq!(vec![0xA0, 0x00, 0x02].encode_hex(), "A00002");

        assert_eq!(u8::decode_hex("1f"), Ok(0x1F));
        assert_eq!(u16::decode_hex("2010"), Ok(0x2010));
        assert!(u8::decode_hex("1FF").is_err());
        assert!(Vec::<u8>::decode_hex("ABC").is_err());
    }
}
