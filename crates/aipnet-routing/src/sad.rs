//! Semantic Address Descriptor (SAD) binary TLV codec (spec §3, §4.5, §6).
//!
//! Wire format: `version(1) flags(1) num_fields(2)` then `num_fields` TLVs of
//! `type(1) length(2) value(length)`, all multi-byte integers big-endian.
//! Max 16 fields, max 512 bytes total. A zero-field SAD is a wildcard.

use std::fmt;

pub const SAD_VERSION: u8 = 1;
pub const MAX_FIELDS: usize = 16;
pub const MAX_TOTAL_LEN: usize = 512;

/// Named capability bits for the `CAPABILITY` field.
pub mod capability {
    pub const TEXT_GEN: u32 = 1 << 0;
    pub const CODE_GEN: u32 = 1 << 1;
    pub const IMAGE_GEN: u32 = 1 << 2;
    pub const AUDIO_GEN: u32 = 1 << 3;
    pub const EMBEDDING: u32 = 1 << 4;
    pub const CLASSIFICATION: u32 = 1 << 5;
    pub const TOOL_USE: u32 = 1 << 6;
    pub const REASONING: u32 = 1 << 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    ModelArch = 1,
    Capability = 2,
    ContextWindow = 3,
    MaxLatencyMs = 4,
    MaxCostMilli = 5,
    TrustLevel = 6,
    RegionPrefer = 7,
    RegionExclude = 8,
    PublisherId = 9,
    MinBenchmark = 10,
    Custom = 11,
}

impl FieldType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => FieldType::ModelArch,
            2 => FieldType::Capability,
            3 => FieldType::ContextWindow,
            4 => FieldType::MaxLatencyMs,
            5 => FieldType::MaxCostMilli,
            6 => FieldType::TrustLevel,
            7 => FieldType::RegionPrefer,
            8 => FieldType::RegionExclude,
            9 => FieldType::PublisherId,
            10 => FieldType::MinBenchmark,
            11 => FieldType::Custom,
            _ => return None,
        })
    }
}

/// A decoded SAD field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    U32(u32),
    U8(u8),
    U16List(Vec<u16>),
    Bytes16([u8; 16]),
    Custom(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub ty: FieldType,
    pub value: FieldValue,
}

/// A decoded/constructed Semantic Address Descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sad {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SadError {
    TooManyFields(usize),
    TooLong(usize),
    BadVersion(u8),
    BadFieldLength { ty: u8, expected: &'static str, actual: usize },
    BufferTooShort,
}

impl fmt::Display for SadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SadError::TooManyFields(n) => write!(f, "SAD has {n} fields, max is {MAX_FIELDS}"),
            SadError::TooLong(n) => write!(f, "SAD is {n} bytes, max is {MAX_TOTAL_LEN}"),
            SadError::BadVersion(v) => write!(f, "unsupported SAD version {v}"),
            SadError::BadFieldLength { ty, expected, actual } => {
                write!(f, "field type {ty} expected {expected}, got {actual} bytes")
            }
            SadError::BufferTooShort => write!(f, "buffer too short to decode SAD"),
        }
    }
}

impl std::error::Error for SadError {}

impl Sad {
    pub fn wildcard() -> Self {
        Self::default()
    }

    pub fn is_wildcard(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn with_u32(mut self, ty: FieldType, v: u32) -> Self {
        self.fields.push(Field { ty, value: FieldValue::U32(v) });
        self
    }

    pub fn with_u8(mut self, ty: FieldType, v: u8) -> Self {
        self.fields.push(Field { ty, value: FieldValue::U8(v) });
        self
    }

    pub fn with_u16_list(mut self, ty: FieldType, v: Vec<u16>) -> Self {
        self.fields.push(Field { ty, value: FieldValue::U16List(v) });
        self
    }

    pub fn with_bytes16(mut self, ty: FieldType, v: [u8; 16]) -> Self {
        self.fields.push(Field { ty, value: FieldValue::Bytes16(v) });
        self
    }

    fn field(&self, ty: FieldType) -> Option<&Field> {
        self.fields.iter().find(|f| f.ty == ty)
    }

    /// Returns the value of a `u32` field, or 0 when absent (spec §4.5: helper
    /// accessors return zero when absent).
    pub fn u32_or_zero(&self, ty: FieldType) -> u32 {
        match self.field(ty).map(|f| &f.value) {
            Some(FieldValue::U32(v)) => *v,
            _ => 0,
        }
    }

    pub fn u8_or_zero(&self, ty: FieldType) -> u8 {
        match self.field(ty).map(|f| &f.value) {
            Some(FieldValue::U8(v)) => *v,
            _ => 0,
        }
    }

    pub fn u16_list(&self, ty: FieldType) -> &[u16] {
        match self.field(ty).map(|f| &f.value) {
            Some(FieldValue::U16List(v)) => v,
            _ => &[],
        }
    }

    pub fn has_field(&self, ty: FieldType) -> bool {
        self.field(ty).is_some()
    }

    /// Encode to the SAD wire format.
    pub fn encode(&self) -> Result<Vec<u8>, SadError> {
        if self.fields.len() > MAX_FIELDS {
            return Err(SadError::TooManyFields(self.fields.len()));
        }
        let mut out = Vec::with_capacity(4);
        out.push(SAD_VERSION);
        out.push(0); // flags
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());

        for field in &self.fields {
            let value_bytes = encode_value(&field.value);
            out.push(field.ty as u8);
            out.extend_from_slice(&(value_bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(&value_bytes);
        }

        if out.len() > MAX_TOTAL_LEN {
            return Err(SadError::TooLong(out.len()));
        }
        Ok(out)
    }

    /// Decode from the SAD wire format, validating per-field lengths for
    /// known types (spec §4.5 `validate`).
    pub fn decode(buf: &[u8]) -> Result<Self, SadError> {
        if buf.len() > MAX_TOTAL_LEN {
            return Err(SadError::TooLong(buf.len()));
        }
        if buf.len() < 4 {
            return Err(SadError::BufferTooShort);
        }
        let version = buf[0];
        if version != SAD_VERSION {
            return Err(SadError::BadVersion(version));
        }
        let num_fields = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if num_fields > MAX_FIELDS {
            return Err(SadError::TooManyFields(num_fields));
        }

        let mut pos = 4usize;
        let mut fields = Vec::with_capacity(num_fields);
        for _ in 0..num_fields {
            if pos + 3 > buf.len() {
                return Err(SadError::BufferTooShort);
            }
            let ty_byte = buf[pos];
            let len = u16::from_be_bytes([buf[pos + 1], buf[pos + 2]]) as usize;
            pos += 3;
            if pos + len > buf.len() {
                return Err(SadError::BufferTooShort);
            }
            let value_bytes = &buf[pos..pos + len];
            pos += len;

            // spec §4.5: the SAD field-type space has no critical/non-critical
            // split, unlike the frame-header TLV options — unknown types are
            // always non-critical and pass through untouched.
            let (ty, value) = match FieldType::from_u8(ty_byte) {
                Some(ty) => (ty, decode_value(ty, ty_byte, value_bytes)?),
                None => (FieldType::Custom, FieldValue::Custom(value_bytes.to_vec())),
            };
            fields.push(Field { ty, value });
        }

        Ok(Self { fields })
    }

    /// Validate the wire bytes without allocating the full decoded form.
    pub fn validate(buf: &[u8]) -> Result<(), SadError> {
        Self::decode(buf).map(|_| ())
    }
}

fn encode_value(value: &FieldValue) -> Vec<u8> {
    match value {
        FieldValue::U32(v) => v.to_be_bytes().to_vec(),
        FieldValue::U8(v) => vec![*v],
        FieldValue::U16List(list) => list.iter().flat_map(|v| v.to_be_bytes()).collect(),
        FieldValue::Bytes16(v) => v.to_vec(),
        FieldValue::Custom(v) => v.clone(),
    }
}

fn decode_value(ty: FieldType, ty_byte: u8, bytes: &[u8]) -> Result<FieldValue, SadError> {
    use FieldType::*;
    match ty {
        ModelArch | Capability | ContextWindow | MaxLatencyMs | MaxCostMilli | MinBenchmark => {
            if bytes.len() != 4 {
                return Err(SadError::BadFieldLength { ty: ty_byte, expected: "4 bytes", actual: bytes.len() });
            }
            Ok(FieldValue::U32(u32::from_be_bytes(bytes.try_into().unwrap())))
        }
        TrustLevel => {
            if bytes.len() != 1 {
                return Err(SadError::BadFieldLength { ty: ty_byte, expected: "1 byte", actual: bytes.len() });
            }
            Ok(FieldValue::U8(bytes[0]))
        }
        RegionPrefer | RegionExclude => {
            if bytes.is_empty() || bytes.len() % 2 != 0 {
                return Err(SadError::BadFieldLength { ty: ty_byte, expected: "non-empty multiple of 2 bytes", actual: bytes.len() });
            }
            let list = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Ok(FieldValue::U16List(list))
        }
        PublisherId => {
            if bytes.len() != 16 {
                return Err(SadError::BadFieldLength { ty: ty_byte, expected: "16 bytes", actual: bytes.len() });
            }
            let mut arr = [0u8; 16];
            arr.copy_from_slice(bytes);
            Ok(FieldValue::Bytes16(arr))
        }
        Custom => Ok(FieldValue::Custom(bytes.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_round_trips() {
        let sad = Sad::wildcard();
        let buf = sad.encode().unwrap();
        let decoded = Sad::decode(&buf).unwrap();
        assert!(decoded.is_wildcard());
        assert!(Sad::validate(&buf).is_ok());
    }

    #[test]
    fn full_sad_round_trips() {
        let sad = Sad::wildcard()
            .with_u32(FieldType::ModelArch, 42)
            .with_u32(FieldType::Capability, capability::CODE_GEN | capability::TEXT_GEN)
            .with_u32(FieldType::ContextWindow, 131_072)
            .with_u8(FieldType::TrustLevel, 3)
            .with_u16_list(FieldType::RegionPrefer, vec![1, 2, 3])
            .with_bytes16(FieldType::PublisherId, [9; 16]);

        let buf = sad.encode().unwrap();
        assert!(buf.len() <= MAX_TOTAL_LEN);
        let decoded = Sad::decode(&buf).unwrap();
        assert_eq!(decoded, sad);
        assert_eq!(decoded.u32_or_zero(FieldType::ContextWindow), 131_072);
        assert_eq!(decoded.u8_or_zero(FieldType::TrustLevel), 3);
        assert_eq!(decoded.u16_list(FieldType::RegionPrefer), &[1, 2, 3]);
        assert_eq!(decoded.u32_or_zero(FieldType::MaxLatencyMs), 0);
    }

    #[test]
    fn rejects_bad_field_length() {
        // CONTEXT_WINDOW (type 3) with a 2-byte value instead of 4.
        let buf = [1u8, 0, 0, 1, 3, 0, 2, 0xFF, 0xFF];
        assert!(matches!(
            Sad::decode(&buf),
            Err(SadError::BadFieldLength { .. })
        ));
    }

    #[test]
    fn unknown_field_type_round_trips_as_custom() {
        // Type 99 is outside the known range; spec §4.5 requires it be
        // tolerated and carried through as an opaque value, not rejected.
        let buf = [1u8, 0, 0, 1, 99, 0, 1, 0xAB];
        let decoded = Sad::decode(&buf).unwrap();
        assert_eq!(decoded.fields.len(), 1);
        assert_eq!(decoded.fields[0].ty, FieldType::Custom);
        assert_eq!(decoded.fields[0].value, FieldValue::Custom(vec![0xAB]));
    }

    #[test]
    fn decode_never_panics_on_random_bytes() {
        let mut seed = 0x00C0_FFEEu32;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let len = (seed % 40) as usize;
            let mut buf = vec![0u8; len];
            for b in buf.iter_mut() {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                *b = (seed >> 24) as u8;
            }
            let _ = Sad::decode(&buf);
        }
    }
}
