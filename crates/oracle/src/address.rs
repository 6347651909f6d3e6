//! Bech32 account addresses (`cosmos1...`).

use sha2::{Digest, Sha256};

use crate::error::{OracleError, Result};

pub const ADDRESS_PREFIX: &str = "cosmos";

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
const CHECKSUM_LEN: usize = 6;
const MAX_LEN: usize = 90;
const ACCOUNT_LEN: usize = 20;

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for v in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(*v);
        for (i, g) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

fn checksum(hrp: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; CHECKSUM_LEN]);
    let pm = polymod(&values) ^ 1;
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, o) in out.iter_mut().enumerate() {
        *o = ((pm >> (5 * (5 - i))) & 0x1f) as u8;
    }
    out
}

/// Regroups a bit stream from `from`-bit to `to`-bit words.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for v in data {
        let v = u32::from(*v);
        if v >> from != 0 {
            return None;
        }
        acc = (acc << from) | v;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return None;
    }
    Some(out)
}

fn encode(hrp: &str, payload: &[u8]) -> Option<String> {
    let data = convert_bits(payload, 8, 5, true)?;
    let sum = checksum(hrp, &data);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LEN);
    out.push_str(hrp);
    out.push('1');
    for d in data.iter().chain(sum.iter()) {
        out.push(char::from(CHARSET[usize::from(*d)]));
    }
    Some(out)
}

/// Checks that `address` is a well-formed account address with the
/// [`ADDRESS_PREFIX`] prefix.
pub fn validate_address(address: &str) -> Result<()> {
    let invalid = |reason: &str| OracleError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    if address.is_empty() {
        return Err(invalid("empty address string is not allowed"));
    }
    if address.len() > MAX_LEN {
        return Err(invalid("too long"));
    }
    let has_lower = address.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = address.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(invalid("mixed case"));
    }
    let lower = address.to_ascii_lowercase();
    let sep = lower.rfind('1').ok_or_else(|| invalid("missing separator"))?;
    let (hrp, rest) = lower.split_at(sep);
    if hrp != ADDRESS_PREFIX {
        return Err(invalid("wrong prefix"));
    }
    let rest = &rest[1..];
    if rest.len() < CHECKSUM_LEN {
        return Err(invalid("too short"));
    }

    let mut data = Vec::with_capacity(rest.len());
    for c in rest.bytes() {
        let pos = CHARSET
            .iter()
            .position(|x| *x == c)
            .ok_or_else(|| invalid("invalid character"))?;
        data.push(pos as u8);
    }

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&data);
    if polymod(&values) != 1 {
        return Err(invalid("invalid checksum"));
    }

    let payload = convert_bits(&data[..data.len() - CHECKSUM_LEN], 5, 8, false)
        .ok_or_else(|| invalid("invalid padding"))?;
    if payload.len() != ACCOUNT_LEN {
        return Err(invalid(&format!("payload is {} bytes", payload.len())));
    }
    Ok(())
}

/// Derives the deterministic address of a named account: the first 20 bytes
/// of SHA-256 over the name.
pub fn derive_address(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    // 20 bytes always regroup cleanly into 5-bit words
    encode(ADDRESS_PREFIX, &digest[..ACCOUNT_LEN]).unwrap_or_default()
}
