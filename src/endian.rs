//! Word byte-order normalization.

use crate::error::StampError;

/// What to do with bytes left over after the last whole 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialWord {
    /// Fail with [`StampError::UnalignedLength`].
    #[default]
    Reject,
    /// Drop the trailing bytes.
    Truncate,
}

/// Reverses the byte order of every 32-bit word in `bytes`.
pub fn to_little_endian_words(bytes: &[u8], partial: PartialWord) -> Result<Vec<u8>, StampError> {
    let remainder = bytes.len() % 4;
    if remainder != 0 {
        match partial {
            PartialWord::Reject => return Err(StampError::UnalignedLength { len: bytes.len() }),
            PartialWord::Truncate => {
                tracing::warn!("dropping {} trailing bytes of a partial word", remainder)
            }
        }
    }
    Ok(bytes
        .chunks_exact(4)
        .flat_map(|word| [word[3], word[2], word[1], word[0]])
        .collect())
}
