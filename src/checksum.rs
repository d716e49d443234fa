//! Checksum computation.
//!
//! The checksum is the plain CRC-32 (IEEE 802.3 polynomial, as used by zlib)
//! of the normalized image. The configured "seed" is applied as a mask on the
//! result, never as the initial CRC register; the firmware's boot check is
//! built against that value.

/// Mask applied to the CRC when no other is configured.
pub const DEFAULT_MASK: u32 = 0xFFFF_FFFF;

/// CRC-32 of `bytes`, masked with `mask`.
pub fn checksum(bytes: &[u8], mask: u32) -> u32 {
    crc::crc32::checksum_ieee(bytes) & mask
}
