//! Host-side Ergo P2PK address encoding
//!
//! Address bytes: prefix (network | type, 1 byte) || compressed pubkey (33)
//! || blake2b256(prefix || pubkey)[0..4], Base58 encoded. This is the
//! reference the GPU-built payloads are verified against.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Full address length in bytes before Base58 encoding
pub const P2PK_ADDRESS_BYTES: usize = 38;

/// Checksum length in bytes
pub const CHECKSUM_LEN: usize = 4;

/// Ergo network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    /// Mainnet (network prefix 0x00)
    Mainnet,
    /// Testnet (network prefix 0x10)
    Testnet,
}

impl Network {
    /// P2PK prefix byte: network prefix | address type 0x01.
    pub const fn p2pk_prefix_byte(self) -> u8 {
        match self {
            Self::Mainnet => 0x01,
            Self::Testnet => 0x11,
        }
    }
}

/// Build the 38 raw address bytes for a compressed public key.
pub fn p2pk_address_bytes(pubkey: &[u8; 33], network: Network) -> [u8; P2PK_ADDRESS_BYTES] {
    let prefix = network.p2pk_prefix_byte();

    let mut content = [0u8; 34];
    content[0] = prefix;
    content[1..34].copy_from_slice(pubkey);

    let hash: [u8; 32] = Blake2b256::digest(content).into();

    let mut address_bytes = [0u8; P2PK_ADDRESS_BYTES];
    address_bytes[..34].copy_from_slice(&content);
    address_bytes[34..38].copy_from_slice(&hash[..CHECKSUM_LEN]);
    address_bytes
}

/// Encode a compressed public key as an Ergo P2PK address.
pub fn encode_p2pk(pubkey: &[u8; 33], network: Network) -> String {
    bs58::encode(p2pk_address_bytes(pubkey, network)).into_string()
}

/// Encode a compressed public key as a mainnet P2PK address.
pub fn encode_p2pk_mainnet(pubkey: &[u8; 33]) -> String {
    encode_p2pk(pubkey, Network::Mainnet)
}

/// Check that a 38-byte payload carries a valid checksum.
pub fn verify_address_bytes(bytes: &[u8; P2PK_ADDRESS_BYTES]) -> bool {
    let hash: [u8; 32] = Blake2b256::digest(&bytes[..34]).into();
    bytes[34..38] == hash[..CHECKSUM_LEN]
}
