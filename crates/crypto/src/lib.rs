//! Password-based authenticated streaming encryption.
//!
//! This crate is the thin wrapper described as the "crypto stream"
//! component: a fixed 64 KiB I/O buffer, a password-derived key, and a
//! stable wire format. The actual block cipher primitives (`aes`, `ctr`,
//! `hmac`, `sha2`, `pbkdf2`) are external collaborators; this crate only
//! frames them into the `encrypt`/`decrypt` contract.
//!
//! # Wire format
//!
//! ```text
//! [16-byte salt] [block]*
//! block := [ciphertext chunk, <= 64 KiB] [32-byte HMAC-SHA256 tag]
//! ```
//!
//! Each tag covers `block_index (u64 big-endian) || ciphertext chunk`,
//! keyed with a MAC key derived alongside the encryption key from the same
//! PBKDF2 call. There is no explicit end-of-stream marker; `decrypt` is
//! told the total framed size up front (`src_size`) and consumes exactly
//! that many bytes.
//!
//! Verifying each block's tag before decrypting it (rather than buffering
//! the whole ciphertext for one final MAC check) is what lets `decrypt`
//! run in bounded memory while still failing closed on the first bad
//! block.

pub mod error;

use error::{ErrorKind, Result};
use aes::Aes256;
use ctr::Ctr128BE;
use ctr::cipher::{KeyIvInit, StreamCipher};
use exn::ResultExt;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::io::{Read, Write};
use subtle::ConstantTimeEq;
use tracing::instrument;

type Aes256Ctr = Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Fixed I/O buffer / chunk size used when streaming plaintext or ciphertext.
const BLOCK_SIZE: usize = 64 * 1024;
const SALT_LEN: usize = 16;
const TAG_LEN: usize = 32;
const KEY_MATERIAL_LEN: usize = 64;
const PBKDF2_ITERATIONS: u32 = 100_000;

struct Keys {
    enc_key: [u8; 32],
    mac_key: [u8; 32],
}

fn derive_keys(password: &str, salt: &[u8]) -> Keys {
    let mut material = [0u8; KEY_MATERIAL_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut material);
    let mut enc_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    enc_key.copy_from_slice(&material[..32]);
    mac_key.copy_from_slice(&material[32..]);
    Keys { enc_key, mac_key }
}

fn block_tag(mac_key: &[u8; 32], block_index: u64, chunk: &[u8]) -> [u8; TAG_LEN] {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(&block_index.to_be_bytes());
    mac.update(chunk);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&tag);
    out
}

/// Read src to EOF, write ciphertext + authentication framing to dst.
///
/// Plaintext length need not be known in advance; `src` is consumed block
/// by block until it reports EOF.
#[instrument(skip_all, fields(blocks))]
pub fn encrypt(src: &mut dyn Read, dst: &mut dyn Write, password: &str) -> Result<()> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    dst.write_all(&salt).or_raise(|| ErrorKind::Io)?;

    let Keys { enc_key, mac_key } = derive_keys(password, &salt);
    let mut cipher = Aes256Ctr::new((&enc_key).into(), (&[0u8; 16]).into());

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut block_index: u64 = 0;
    loop {
        let n = read_fill(src, &mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        cipher.apply_keystream(chunk);
        let tag = block_tag(&mac_key, block_index, chunk);
        dst.write_all(chunk).or_raise(|| ErrorKind::Io)?;
        dst.write_all(&tag).or_raise(|| ErrorKind::Io)?;
        block_index += 1;
        if n < BLOCK_SIZE {
            break;
        }
    }
    tracing::Span::current().record("blocks", block_index);
    Ok(())
}

/// Consume exactly `src_size` ciphertext bytes from `src`, writing the
/// decrypted plaintext to `dst`.
///
/// Fails with [`ErrorKind::WrongPassword`] on the first bad block tag, and
/// [`ErrorKind::Truncated`] if `src` runs dry before `src_size` bytes have
/// been consumed.
pub fn decrypt(src: &mut dyn Read, dst: &mut dyn Write, password: &str, src_size: u64) -> Result<()> {
    if src_size < SALT_LEN as u64 {
        exn::bail!(ErrorKind::Truncated);
    }
    let mut salt = [0u8; SALT_LEN];
    read_exact_checked(src, &mut salt)?;
    let mut remaining = src_size - SALT_LEN as u64;

    let Keys { enc_key, mac_key } = derive_keys(password, &salt);
    let mut cipher = Aes256Ctr::new((&enc_key).into(), (&[0u8; 16]).into());

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut tag_buf = [0u8; TAG_LEN];
    let mut block_index: u64 = 0;
    while remaining > 0 {
        if remaining <= TAG_LEN as u64 {
            // Not enough room left for even an empty chunk plus its tag.
            exn::bail!(ErrorKind::Truncated);
        }
        let framed_remaining = remaining - TAG_LEN as u64;
        let chunk_len = std::cmp::min(BLOCK_SIZE as u64, framed_remaining) as usize;
        let chunk = &mut buf[..chunk_len];
        read_exact_checked(src, chunk)?;
        read_exact_checked(src, &mut tag_buf)?;

        let expected = block_tag(&mac_key, block_index, chunk);
        if expected.ct_eq(&tag_buf).unwrap_u8() != 1 {
            exn::bail!(ErrorKind::WrongPassword);
        }
        cipher.apply_keystream(chunk);
        dst.write_all(chunk).or_raise(|| ErrorKind::Io)?;

        remaining -= chunk_len as u64 + TAG_LEN as u64;
        block_index += 1;
    }
    Ok(())
}

/// Reads up to `buf.len()` bytes, looping on short reads, returning the
/// number of bytes actually read (0 only at true EOF).
fn read_fill(src: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..]).or_raise(|| ErrorKind::Io)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Like [`Read::read_exact`], but maps an early EOF to [`ErrorKind::Truncated`]
/// instead of a raw I/O error.
fn read_exact_checked(src: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    let n = read_fill(src, buf)?;
    if n < buf.len() {
        exn::bail!(ErrorKind::Truncated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn round_trip(plaintext: &[u8], password: &str) -> Vec<u8> {
        let mut ciphertext = Vec::new();
        encrypt(&mut Cursor::new(plaintext), &mut ciphertext, password).unwrap();
        let mut output = Vec::new();
        decrypt(&mut Cursor::new(&ciphertext), &mut output, password, ciphertext.len() as u64).unwrap();
        output
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"a".as_slice())]
    #[case(b"hello, world!".as_slice())]
    fn round_trips_for_small_inputs(#[case] plaintext: &[u8]) {
        assert_eq!(round_trip(plaintext, "hunter2"), plaintext);
    }

    #[test]
    fn round_trips_across_multiple_blocks() {
        let plaintext = vec![0x42u8; BLOCK_SIZE * 3 + 17];
        assert_eq!(round_trip(&plaintext, "correct horse battery staple"), plaintext);
    }

    #[test]
    fn wrong_password_fails_with_wrong_password_error() {
        let mut ciphertext = Vec::new();
        encrypt(&mut Cursor::new(b"secret contents"), &mut ciphertext, "right").unwrap();
        let mut output = Vec::new();
        let err = decrypt(&mut Cursor::new(&ciphertext), &mut output, "wrong", ciphertext.len() as u64).unwrap_err();
        assert!(matches!(&*err, ErrorKind::WrongPassword));
    }

    #[test]
    fn truncated_ciphertext_fails_with_truncated_error() {
        let mut ciphertext = Vec::new();
        encrypt(&mut Cursor::new(b"some data that spans a full block and then some"), &mut ciphertext, "pw").unwrap();
        let mut output = Vec::new();
        let declared_size = ciphertext.len() as u64 + 100;
        let err = decrypt(&mut Cursor::new(&ciphertext), &mut output, "pw", declared_size).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Truncated));
    }

    #[test]
    fn tampered_ciphertext_byte_fails() {
        let mut ciphertext = Vec::new();
        encrypt(&mut Cursor::new(b"tamper with me"), &mut ciphertext, "pw").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        let mut output = Vec::new();
        let err = decrypt(&mut Cursor::new(&ciphertext), &mut output, "pw", ciphertext.len() as u64).unwrap_err();
        assert!(matches!(&*err, ErrorKind::WrongPassword));
    }

    #[test]
    fn different_salts_produce_different_ciphertext_for_same_input() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encrypt(&mut Cursor::new(b"same plaintext"), &mut a, "pw").unwrap();
        encrypt(&mut Cursor::new(b"same plaintext"), &mut b, "pw").unwrap();
        assert_ne!(a, b);
    }
}
