//! Time-correlation packet body decoding.

use crate::error::FetchError;
use crate::gap::MAX_VCFC;
use crate::types::{Sclk, Vcid};
use serde::Serialize;
use std::fmt;

/// Length of the CCSDS primary header preceding the packet data field.
pub const PRIMARY_HEADER_LEN: usize = 6;

/// Bytes of the data field read by [`ReferenceTcDecoder`].
pub const TC_FIELDS_LEN: usize = 12;

/// Channel coding applied to the frame that carried a TC packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncodingType {
    Unencoded,
    ReedSolomon,
    TurboOneHalf,
    TurboOneThird,
    TurboOneSixth,
    Ldpc,
    Unknown(u8),
}

impl EncodingType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => EncodingType::Unencoded,
            1 => EncodingType::ReedSolomon,
            2 => EncodingType::TurboOneHalf,
            3 => EncodingType::TurboOneThird,
            4 => EncodingType::TurboOneSixth,
            5 => EncodingType::Ldpc,
            other => EncodingType::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            EncodingType::Unencoded => 0,
            EncodingType::ReedSolomon => 1,
            EncodingType::TurboOneHalf => 2,
            EncodingType::TurboOneThird => 3,
            EncodingType::TurboOneSixth => 4,
            EncodingType::Ldpc => 5,
            EncodingType::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingType::Unencoded => f.write_str("UNENCODED"),
            EncodingType::ReedSolomon => f.write_str("REED_SOLOMON"),
            EncodingType::TurboOneHalf => f.write_str("TURBO_1_2"),
            EncodingType::TurboOneThird => f.write_str("TURBO_1_3"),
            EncodingType::TurboOneSixth => f.write_str("TURBO_1_6"),
            EncodingType::Ldpc => f.write_str("LDPC"),
            EncodingType::Unknown(code) => write!(f, "UNKNOWN_{}", code),
        }
    }
}

impl Serialize for EncodingType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Frame reference fields carried in a TC packet body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcFields {
    pub vcid: Vcid,
    pub vcfc: u32,
    pub sclk: Sclk,
    pub encoding: EncodingType,
    pub rate_index: u8,
}

/// Extracts [`TcFields`] from a full packet (primary header included).
pub trait TimeCorrelationDecoder: Send + Sync {
    fn decode(&self, packet_bytes: &[u8]) -> Result<TcFields, FetchError>;
}

/// Fixed big-endian layout at `data_offset`:
/// SCLK coarse (4), SCLK fine (2), VCID (1, low 6 bits), VCFC (3),
/// encoding code (1), rate index (1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceTcDecoder {
    pub data_offset: usize,
}

impl Default for ReferenceTcDecoder {
    fn default() -> Self {
        Self {
            data_offset: PRIMARY_HEADER_LEN,
        }
    }
}

impl ReferenceTcDecoder {
    /// Encodes fields into a packet body understood by this decoder. The
    /// primary header bytes are zero.
    pub fn encode(&self, fields: &TcFields) -> Vec<u8> {
        let mut bytes = vec![0u8; self.data_offset];
        bytes.extend_from_slice(&fields.sclk.coarse.to_be_bytes());
        bytes.extend_from_slice(&fields.sclk.fine.to_be_bytes());
        bytes.push((fields.vcid & 0x3F) as u8);
        bytes.extend_from_slice(&(fields.vcfc & MAX_VCFC).to_be_bytes()[1..]);
        bytes.push(fields.encoding.code());
        bytes.push(fields.rate_index);
        bytes
    }
}

impl TimeCorrelationDecoder for ReferenceTcDecoder {
    fn decode(&self, packet_bytes: &[u8]) -> Result<TcFields, FetchError> {
        let needed = self.data_offset + TC_FIELDS_LEN;
        let data = packet_bytes
            .get(self.data_offset..needed)
            .ok_or_else(|| FetchError::Decode {
                reason: format!(
                    "packet is {} bytes, need at least {}",
                    packet_bytes.len(),
                    needed
                ),
            })?;

        let coarse = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let fine = u16::from_be_bytes([data[4], data[5]]);
        let vcid = Vcid::from(data[6] & 0x3F);
        let vcfc = u32::from_be_bytes([0, data[7], data[8], data[9]]);

        Ok(TcFields {
            vcid,
            vcfc,
            sclk: Sclk::new(coarse, fine),
            encoding: EncodingType::from_code(data[10]),
            rate_index: data[11],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reference_layout() {
        let mut bytes = vec![0xAA; PRIMARY_HEADER_LEN];
        bytes.extend_from_slice(&[
            0x00, 0x00, 0x12, 0x34, // coarse
            0x80, 0x00, // fine
            0xC5, // vcid 5 with spare bits set
            0x12, 0x34, 0x56, // vcfc
            0x02, // turbo 1/2
            0x07, // rate index
        ]);

        let fields = ReferenceTcDecoder::default().decode(&bytes).unwrap();
        assert_eq!(fields.sclk, Sclk::new(0x1234, 0x8000));
        assert_eq!(fields.vcid, 5);
        assert_eq!(fields.vcfc, 0x12_3456);
        assert_eq!(fields.encoding, EncodingType::TurboOneHalf);
        assert_eq!(fields.rate_index, 7);
    }

    #[test]
    fn test_short_body_is_a_decode_error() {
        let err = ReferenceTcDecoder::default()
            .decode(&[0u8; PRIMARY_HEADER_LEN + TC_FIELDS_LEN - 1])
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(err.is_per_packet());
    }

    #[test]
    fn test_encode_matches_decode() {
        let decoder = ReferenceTcDecoder { data_offset: 10 };
        let fields = TcFields {
            vcid: 63,
            vcfc: MAX_VCFC,
            sclk: Sclk::new(u32::MAX, 1),
            encoding: EncodingType::Unknown(9),
            rate_index: 0,
        };
        let bytes = decoder.encode(&fields);
        assert_eq!(bytes.len(), 10 + TC_FIELDS_LEN);
        assert_eq!(decoder.decode(&bytes).unwrap(), fields);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(EncodingType::from_code(5).to_string(), "LDPC");
        assert_eq!(EncodingType::from_code(200).to_string(), "UNKNOWN_200");
        assert_eq!(EncodingType::from_code(200).code(), 200);
    }
}
