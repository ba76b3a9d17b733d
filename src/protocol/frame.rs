use core::fmt::{self, Display, Formatter};
use core::iter::FusedIterator;

use super::{Packet, PacketType, HEADER_LEN};

/// Diagnostic items yielded while walking a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Type tag not in the catalogue; the packet was skipped.
    UnknownType { packet_type: u8, length: u8 },
    /// Declared length too short for the fields of a known packet; skipped.
    Truncated { packet_type: PacketType },
    /// A header runs past the end of the frame, or declares a length shorter
    /// than the header. Nothing after `offset` is decoded.
    Corrupt { offset: usize },
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::UnknownType {
                packet_type,
                length,
            } => write!(f, "unknown packet type {packet_type} ({length} bytes)"),
            FrameError::Truncated { packet_type } => {
                write!(f, "truncated {packet_type:?} packet")
            }
            FrameError::Corrupt { offset } => write!(f, "corrupt frame at offset {offset}"),
        }
    }
}

/// Walks the packets of `bytes` from offset 0.
pub fn decode_frame(bytes: &[u8]) -> FrameDecoder<'_> {
    FrameDecoder {
        bytes,
        offset: 0,
        done: false,
    }
}

pub struct FrameDecoder<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl FrameDecoder<'_> {
    /// Offset of the next packet header.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn corrupt(&mut self) -> Option<Result<Packet, FrameError>> {
        self.done = true;
        Some(Err(FrameError::Corrupt {
            offset: self.offset,
        }))
    }
}

impl Iterator for FrameDecoder<'_> {
    type Item = Result<Packet, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset == self.bytes.len() {
            self.done = true;
            return None;
        }

        let Some(&[tag, length]) = self.bytes.get(self.offset..self.offset + HEADER_LEN) else {
            return self.corrupt();
        };
        let end = self.offset + length as usize;
        if (length as usize) < HEADER_LEN || end > self.bytes.len() {
            return self.corrupt();
        }

        let payload = &self.bytes[self.offset + HEADER_LEN..end];
        self.offset = end;

        Some(match PacketType::try_from(tag) {
            Ok(packet_type) => Packet::decode(packet_type, payload)
                .map_err(|_| FrameError::Truncated { packet_type }),
            Err(_) => Err(FrameError::UnknownType {
                packet_type: tag,
                length,
            }),
        })
    }
}

impl FusedIterator for FrameDecoder<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Gesture;
    use crate::protocol::{push_packet, Frame};
    use std::vec::Vec;

    fn collect(bytes: &[u8]) -> Vec<Result<Packet, FrameError>> {
        decode_frame(bytes).collect()
    }

    #[test]
    fn test_concatenated_packets_round_trip() {
        let packets = [
            Packet::TouchEvent {
                gesture: Gesture::Tap,
                electrode: 4,
                repeat: false,
            },
            Packet::StatusUpdate {
                battery_level: 2950,
                status_count: 17,
            },
            Packet::Configure {
                offset: 50,
                value: 3,
            },
            Packet::Ping,
        ];
        let mut frame = Frame::new();
        for p in &packets {
            push_packet(&mut frame, p).unwrap();
        }
        assert_eq!(frame.len(), 5 + 8 + 4 + 2);

        let mut decoder = decode_frame(&frame);
        for p in &packets {
            assert_eq!(decoder.next(), Some(Ok(*p)));
        }
        assert_eq!(decoder.offset(), frame.len());
        assert_eq!(decoder.next(), None);
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn test_decoding_restarts_from_zero() {
        let frame = Packet::Ping.to_frame().unwrap();
        assert_eq!(collect(&frame), collect(&frame));
        assert_eq!(collect(&frame).len(), 1);
    }

    #[test]
    fn test_empty_frame_yields_nothing() {
        assert!(collect(&[]).is_empty());
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let bytes = [0x2A, 4, 0xFF, 0xFF, 4, 2];
        assert_eq!(
            collect(&bytes),
            [
                Err(FrameError::UnknownType {
                    packet_type: 0x2A,
                    length: 4
                }),
                Ok(Packet::Ping)
            ]
        );
    }

    #[test]
    fn test_short_known_packet_is_truncated_and_skipped() {
        // Configure declared as 3 bytes carries only the offset
        let bytes = [3, 3, 50, 4, 2];
        assert_eq!(
            collect(&bytes),
            [
                Err(FrameError::Truncated {
                    packet_type: PacketType::Configure
                }),
                Ok(Packet::Ping)
            ]
        );
    }

    #[test]
    fn test_overrun_is_corrupt_and_ends_decoding() {
        let bytes = [4, 2, 1, 8, 0, 0];
        assert_eq!(
            collect(&bytes),
            [Ok(Packet::Ping), Err(FrameError::Corrupt { offset: 2 })]
        );
    }

    #[test]
    fn test_zero_length_is_corrupt() {
        let bytes = [4, 0, 4, 2];
        assert_eq!(collect(&bytes), [Err(FrameError::Corrupt { offset: 0 })]);
    }

    #[test]
    fn test_dangling_header_byte_is_corrupt() {
        let bytes = [4, 2, 4];
        assert_eq!(
            collect(&bytes),
            [Ok(Packet::Ping), Err(FrameError::Corrupt { offset: 2 })]
        );
    }
}
