//! Minimal container sniffing for cache verification.
//!
//! Reads only the first [`PROBE_LEN`] bytes of a file. This is not a decoder:
//! it catches the common corruptions seen on kiosks (truncated downloads,
//! HTML error pages saved as `.mp4`) without pulling in a media stack.

use std::fmt;

/// Number of header bytes the probe inspects.
pub const PROBE_LEN: usize = 512;

/// MPEG transport stream packet size.
const TS_PACKET_LEN: usize = 188;

/// EBML magic shared by Matroska and WebM.
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Top-level QuickTime atoms that may open a `.mov` without an `ftyp` box.
const QUICKTIME_ATOMS: [&[u8; 4]; 5] = [b"moov", b"mdat", b"wide", b"free", b"skip"];

/// Video container recognized by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// ISO base media (`ftyp` box).
    Mp4,
    /// QuickTime movie.
    QuickTime,
    /// Matroska or WebM (EBML header).
    Matroska,
    /// MPEG transport stream.
    MpegTs,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Container::Mp4 => "mp4",
            Container::QuickTime => "quicktime",
            Container::Matroska => "matroska",
            Container::MpegTs => "mpeg-ts",
        };
        f.write_str(name)
    }
}

/// Detects the container from a file header.
pub fn detect(header: &[u8]) -> Option<Container> {
    if header.starts_with(&EBML_MAGIC) {
        return Some(Container::Matroska);
    }

    if header.len() >= 8 {
        let atom = &header[4..8];
        if atom == b"ftyp" {
            let brand = header.get(8..12);
            return Some(if brand == Some(b"qt  ".as_slice()) {
                Container::QuickTime
            } else {
                Container::Mp4
            });
        }
        if QUICKTIME_ATOMS.iter().any(|a| atom == a.as_slice()) {
            return Some(Container::QuickTime);
        }
    }

    if header.len() > TS_PACKET_LEN && header[0] == 0x47 && header[TS_PACKET_LEN] == 0x47 {
        return Some(Container::MpegTs);
    }

    None
}
