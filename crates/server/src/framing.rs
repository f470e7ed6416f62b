// Copyright 2022-2026 SwiftDB developers.
// This file is part of SwiftDB.

// SwiftDB is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// SwiftDB is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with SwiftDB.  If not, see <http://www.gnu.org/licenses/>.

//! Length-prefixed message framing.
//!
//! Each frame is `u32 length (little-endian) | payload | 0x00`, where
//! `length` counts the payload plus the terminator byte. A zero length is
//! a keepalive beat carrying nothing. The terminator sits outside any
//! encryption and only serves as an overrun check.

use std::io::{self, Read, Write};

/// Hard payload cap; anything larger is a fatal protocol error.
pub const MAX_PACKET_SIZE: u32 = 100 * 1024 * 1024;

/// One received frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Zero-length beat; refreshes liveness and carries no payload.
    Keepalive,
    /// Payload bytes with the terminator stripped.
    Message(Vec<u8>),
}

/// Receive-side failures. Everything but `Io` is a protocol violation.
#[derive(Debug)]
pub enum FrameError {
    /// The peer closed the stream at a frame boundary.
    Disconnected,
    /// The declared length exceeds `MAX_PACKET_SIZE`.
    PacketSizeExceeded,
    /// The final byte of the frame is not the 0x00 terminator.
    OverflowProtectionTriggered,
    Io(io::Error),
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => FrameError::Disconnected,
            _ => FrameError::Io(err),
        }
    }
}

/// Reads exactly one frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;
    let length = u32::from_le_bytes(header);

    if length == 0 {
        return Ok(Frame::Keepalive);
    }
    if length > MAX_PACKET_SIZE {
        return Err(FrameError::PacketSizeExceeded);
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload)?;

    if payload[payload.len() - 1] != 0 {
        return Err(FrameError::OverflowProtectionTriggered);
    }
    payload.pop();

    Ok(Frame::Message(payload))
}

/// Writes one frame around `payload` in a single buffered write.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let mut frame = Vec::with_capacity(4 + payload.len() + 1);
    frame.extend_from_slice(&(payload.len() as u32 + 1).to_le_bytes());
    frame.extend_from_slice(payload);
    frame.push(0);
    writer.write_all(&frame)
}

/// Writes a zero-length keepalive beat.
pub fn write_keepalive<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&0u32.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        for payload in [&b""[..], b"{}", b"x", &[0xFFu8; 300][..]] {
            let mut wire = Vec::new();
            write_frame(&mut wire, payload).unwrap();
            assert_eq!(wire.len(), 4 + payload.len() + 1);
            // Length prefix is little-endian and counts the terminator.
            assert_eq!(
                u32::from_le_bytes(wire[..4].try_into().unwrap()),
                payload.len() as u32 + 1
            );

            match read_frame(&mut Cursor::new(wire)).unwrap() {
                Frame::Message(read) => assert_eq!(read, payload),
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    #[test]
    fn keepalive_round_trip() {
        let mut wire = Vec::new();
        write_keepalive(&mut wire).unwrap();
        assert_eq!(wire, vec![0, 0, 0, 0]);
        assert_eq!(read_frame(&mut Cursor::new(wire)).unwrap(), Frame::Keepalive);
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let wire = (MAX_PACKET_SIZE + 1).to_le_bytes();
        assert!(matches!(
            read_frame(&mut Cursor::new(wire.to_vec())),
            Err(FrameError::PacketSizeExceeded)
        ));
    }

    #[test]
    fn missing_terminator_trips_overflow_protection() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&3u32.to_le_bytes());
        wire.extend_from_slice(b"abc");
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::OverflowProtectionTriggered)
        ));
    }

    #[test]
    fn eof_reports_disconnect() {
        assert!(matches!(
            read_frame(&mut Cursor::new(Vec::new())),
            Err(FrameError::Disconnected)
        ));

        // Truncated mid-payload counts as a disconnect too.
        let mut wire = Vec::new();
        wire.extend_from_slice(&10u32.to_le_bytes());
        wire.extend_from_slice(b"ab");
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Disconnected)
        ));
    }
}
