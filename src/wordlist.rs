//! BIP39 wordlist packing for GPU upload
//!
//! The kernel looks words up in a fixed-width table: 2048 entries of 8
//! zero-padded bytes plus a separate length array. Embedding the table as a
//! giant OpenCL constant array is what this avoids; the data itself comes
//! from the `bip39` crate's English list.

use crate::error::{GpuError, Result};
use bip39::Language;
use ocl::{Buffer, MemFlags, Queue};

/// Fixed width per word entry (BIP39 English max is 8 chars)
pub const WORD_WIDTH: usize = 8;

/// Number of words in the BIP39 English wordlist
pub const WORD_COUNT: usize = 2048;

/// Packed word data size in bytes
pub const WORDS_DATA_SIZE: usize = WORD_COUNT * WORD_WIDTH;

/// Generate the packed word table (2048 x 8 bytes, zero padded).
pub fn packed_words() -> Vec<u8> {
    let words = Language::English.word_list();
    debug_assert_eq!(words.len(), WORD_COUNT);

    let mut data = vec![0u8; WORDS_DATA_SIZE];
    for (i, word) in words.iter().enumerate() {
        let bytes = word.as_bytes();
        debug_assert!(bytes.len() <= WORD_WIDTH, "word {} too long: {}", i, word);
        data[i * WORD_WIDTH..i * WORD_WIDTH + bytes.len()].copy_from_slice(bytes);
    }
    data
}

/// Generate the word length table (2048 bytes).
pub fn word_lengths() -> Vec<u8> {
    Language::English
        .word_list()
        .iter()
        .map(|w| w.len() as u8)
        .collect()
}

/// Uploaded wordlist buffers for one device.
pub struct WordlistBuffers {
    pub words8: Buffer<u8>,
    pub lens: Buffer<u8>,
}

impl WordlistBuffers {
    /// Upload the packed wordlist to a device queue.
    pub fn upload(queue: &Queue) -> Result<Self> {
        let words = packed_words();
        let lens = word_lengths();

        let words8 = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only().copy_host_ptr())
            .len(words.len())
            .copy_host_slice(&words)
            .build()
            .map_err(|e| GpuError::Buffer(format!("wordlist upload: {}", e)))?;

        let lens_buf = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only().copy_host_ptr())
            .len(lens.len())
            .copy_host_slice(&lens)
            .build()
            .map_err(|e| GpuError::Buffer(format!("wordlist lengths upload: {}", e)))?;

        Ok(Self {
            words8,
            lens: lens_buf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes() {
        assert_eq!(packed_words().len(), WORDS_DATA_SIZE);
        assert_eq!(word_lengths().len(), WORD_COUNT);
    }

    #[test]
    fn test_first_and_last_words() {
        let data = packed_words();
        let lens = word_lengths();

        // First word is "abandon" (7 chars, zero padded)
        assert_eq!(lens[0], 7);
        assert_eq!(&data[0..7], b"abandon");
        assert_eq!(data[7], 0);

        // Last word (index 2047) is "zoo"
        let offset = 2047 * WORD_WIDTH;
        assert_eq!(lens[2047], 3);
        assert_eq!(&data[offset..offset + 3], b"zoo");
    }

    #[test]
    fn test_all_lengths_in_range() {
        for (i, &len) in word_lengths().iter().enumerate() {
            assert!((3..=8).contains(&len), "word {} has length {}", i, len);
        }
    }

    #[test]
    fn test_padding_is_zero() {
        let data = packed_words();
        let lens = word_lengths();
        for i in 0..WORD_COUNT {
            let offset = i * WORD_WIDTH;
            for &b in &data[offset + lens[i] as usize..offset + WORD_WIDTH] {
                assert_eq!(b, 0, "non-zero padding in word {}", i);
            }
        }
    }
}
