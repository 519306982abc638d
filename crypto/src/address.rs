//! Wallet addresses of signing wallets.
//!
//! A wallet that signs ballots is identified by its Ed25519 public key in
//! lowercase hex (64 characters). Any other address format is treated as an
//! unverifiable label and cannot sign ballots.

use agora_types::{ParseError, PublicKey, WalletAddress};

/// The address under which a signing wallet votes.
pub fn address_from_public_key(public_key: &PublicKey) -> WalletAddress {
    // 64 lowercase hex characters always pass address validation.
    WalletAddress::parse(public_key.to_hex())
        .unwrap_or_else(|_| unreachable!("hex public key is a valid address"))
}

/// Recover the public key behind a signing wallet's address.
pub fn public_key_from_address(address: &WalletAddress) -> Result<PublicKey, ParseError> {
    let raw = address.as_str();
    let hex_part = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    PublicKey::from_hex(hex_part)
}
