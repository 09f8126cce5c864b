// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Report-data binding.
//!
//! The enclave commits to its session keys and the relying party's nonce
//! by placing `SHA-256(armored verification key || encryption key) || nonce`
//! in the quote's report-data field. Recomputing that commitment and
//! comparing it against the quote ties the attested enclave to this
//! session and defeats quote replay.

use crate::quote::{ReportData, REPORT_DATA_SIZE};
use alloc::string::String;
use alloc::vec::Vec;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";
const PEM_LINE_WIDTH: usize = 64;

/// The session material an enclave binds into its quote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingCommitment {
    /// The enclave's signing key, PEM or bare base64.
    pub verification_key: String,
    /// The enclave's encryption key, hashed exactly as supplied.
    pub encryption_key: String,
    /// The relying party's freshness nonce.
    pub nonce: Vec<u8>,
}

impl BindingCommitment {
    /// Compute the commitment bytes the enclave is expected to have placed
    /// in report-data: the 32-byte key digest followed by the nonce.
    pub fn expected_bytes(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(pem_armor(&self.verification_key).as_bytes());
        hasher.update(self.encryption_key.as_bytes());
        let digest = hasher.finalize();

        let mut expected = Vec::with_capacity(digest.len() + self.nonce.len());
        expected.extend_from_slice(&digest);
        expected.extend_from_slice(&self.nonce);
        expected
    }

    /// Whether the quote's report-data carries this commitment.
    ///
    /// Compares only the commitment-length prefix of report-data; trailing
    /// bytes are padding the enclave never set. A commitment longer than
    /// the field can never match. The comparison is constant time.
    pub fn matches(&self, report_data: &ReportData) -> bool {
        let expected = self.expected_bytes();
        if expected.len() > REPORT_DATA_SIZE {
            return false;
        }
        let actual = &report_data.as_ref()[..expected.len()];
        expected.as_slice().ct_eq(actual).into()
    }
}

/// Normalize a verification key to its PEM form.
///
/// Keys already carrying PEM armor are hashed as-is. A bare base64 body is
/// re-wrapped at 64 columns between public-key armor lines, each line
/// newline-terminated, so both spellings of the same key hash identically.
fn pem_armor(key: &str) -> String {
    if key.contains(PEM_HEADER) {
        return key.into();
    }
    let body: String = key.split_whitespace().collect();
    let mut armored = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    armored.push_str(PEM_HEADER);
    armored.push('\n');
    // Wrap per character, not per byte: the key is prover supplied and a
    // byte-offset slice would panic inside a multi-byte character.
    let mut column = 0;
    for ch in body.chars() {
        armored.push(ch);
        column += 1;
        if column == PEM_LINE_WIDTH {
            armored.push('\n');
            column = 0;
        }
    }
    if column != 0 {
        armored.push('\n');
    }
    armored.push_str(PEM_FOOTER);
    armored.push('\n');
    armored
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    // Longer than one armor line, so wrapping produces a full 64-char
    // line and a short tail line.
    const KEY_BODY: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEmObQo0DHcHZFZ\
        sUzhBwQQLra27EKmlsCCDqtGYTdvGqaoIVc7q6mDtHp5L5tv6EYFvvcY5I1DnCGlEg";

    fn commitment() -> BindingCommitment {
        BindingCommitment {
            verification_key: KEY_BODY.split_whitespace().collect(),
            encryption_key: "encryption key bytes".to_string(),
            nonce: b"0123456789abcdef".to_vec(),
        }
    }

    fn report_data_for(commitment: &BindingCommitment) -> ReportData {
        let expected = commitment.expected_bytes();
        let mut bytes = [0u8; REPORT_DATA_SIZE];
        bytes[..expected.len()].copy_from_slice(&expected);
        ReportData::from(bytes)
    }

    #[test]
    fn armoring_a_bare_key_wraps_at_64_columns() {
        let commitment = commitment();
        let armored = pem_armor(&commitment.verification_key);
        let lines: Vec<&str> = armored.lines().collect();
        assert_eq!(lines[0], PEM_HEADER);
        assert_eq!(lines[1].len(), 64);
        assert!(lines[2].len() <= 64);
        assert_eq!(*lines.last().unwrap(), PEM_FOOTER);
        assert!(armored.ends_with('\n'));
    }

    #[test]
    fn multibyte_key_straddling_a_line_boundary_is_armored_safely() {
        // The 64th character is multi-byte, so a byte-offset wrap would
        // split it mid character.
        let key = alloc::format!("{}é{}", "a".repeat(63), "b".repeat(10));
        let armored = pem_armor(&key);
        let lines: Vec<&str> = armored.lines().collect();
        assert_eq!(lines[1].chars().count(), 64);
        assert!(lines[1].ends_with('é'));
        assert_eq!(lines[2], "b".repeat(10));

        let commitment = BindingCommitment {
            verification_key: key,
            encryption_key: "encryption key bytes".to_string(),
            nonce: b"0123456789abcdef".to_vec(),
        };
        assert!(commitment.matches(&report_data_for(&commitment)));
        assert!(!commitment.matches(&ReportData::from([0u8; REPORT_DATA_SIZE])));
    }

    #[test]
    fn already_armored_key_is_untouched() {
        let armored = pem_armor("-----BEGIN PUBLIC KEY-----\nabcd\n-----END PUBLIC KEY-----\n");
        assert_eq!(
            armored,
            "-----BEGIN PUBLIC KEY-----\nabcd\n-----END PUBLIC KEY-----\n"
        );
    }

    #[test]
    fn bare_and_armored_spellings_hash_identically() {
        let bare = commitment();
        let armored = BindingCommitment {
            verification_key: pem_armor(&bare.verification_key),
            ..bare.clone()
        };
        assert_eq!(bare.expected_bytes(), armored.expected_bytes());
    }

    #[test]
    fn expected_bytes_are_digest_then_nonce() {
        let commitment = commitment();
        let expected = commitment.expected_bytes();
        assert_eq!(expected.len(), 32 + commitment.nonce.len());
        assert_eq!(&expected[32..], commitment.nonce.as_slice());
    }

    #[test]
    fn matching_report_data_is_accepted() {
        let commitment = commitment();
        assert!(commitment.matches(&report_data_for(&commitment)));
    }

    #[test]
    fn trailing_padding_is_ignored() {
        let commitment = commitment();
        let expected = commitment.expected_bytes();
        let mut bytes = [0xffu8; REPORT_DATA_SIZE];
        bytes[..expected.len()].copy_from_slice(&expected);
        assert!(commitment.matches(&ReportData::from(bytes)));
    }

    #[test]
    fn flipped_nonce_bit_is_rejected() {
        let commitment = commitment();
        let report_data = report_data_for(&commitment);

        let mut replayed = commitment.clone();
        replayed.nonce[0] ^= 0x01;
        assert!(!replayed.matches(&report_data));
    }

    #[test]
    fn altered_verification_key_is_rejected() {
        let commitment = commitment();
        let report_data = report_data_for(&commitment);

        let mut altered = commitment.clone();
        altered.verification_key.replace_range(0..1, "N");
        assert!(!altered.matches(&report_data));
    }

    #[test]
    fn different_key_is_rejected() {
        let commitment = commitment();
        let report_data = report_data_for(&commitment);

        let other = BindingCommitment {
            encryption_key: "some other key".to_string(),
            ..commitment
        };
        assert!(!other.matches(&report_data));
    }

    #[test]
    fn oversized_commitment_never_matches() {
        let commitment = BindingCommitment {
            nonce: vec![0u8; 33],
            ..commitment()
        };
        assert!(!commitment.matches(&ReportData::from([0u8; REPORT_DATA_SIZE])));
    }

    #[test]
    fn empty_nonce_commitment_is_just_the_digest() {
        let commitment = BindingCommitment {
            nonce: vec![],
            ..commitment()
        };
        assert_eq!(commitment.expected_bytes().len(), 32);
        assert!(commitment.matches(&report_data_for(&commitment)));
    }
}
