// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Validated view of the fixed-layout enclave quote.
//!
//! The quote arrives from an untrusted prover, so the total length is
//! checked once up front and every accessor copies out of a fixed,
//! statically-known range. No accessor trusts a length declared inside the
//! buffer, and nothing here overlays a struct onto raw bytes.

use crate::error::DecodeError;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};

/// Size of the quote body carried in `isvEnclaveQuoteBody`: the EPID
/// `sgx_quote_t` without its trailing signature.
pub const QUOTE_BODY_SIZE: usize = 432;

/// Size of the opaque report-data commitment field.
pub const REPORT_DATA_SIZE: usize = 64;

// The report body starts after the 48-byte quote header. Field offsets
// within the full quote body, per the Intel quote layout.
const REPORT_BODY_OFFSET: usize = 48;
const EPID_GROUP_ID_OFFSET: usize = 4;
const BASENAME_OFFSET: usize = 16;
const MR_ENCLAVE_OFFSET: usize = REPORT_BODY_OFFSET + 64;
const MR_SIGNER_OFFSET: usize = REPORT_BODY_OFFSET + 128;
const ISV_PROD_ID_OFFSET: usize = REPORT_BODY_OFFSET + 256;
const ISV_SVN_OFFSET: usize = REPORT_BODY_OFFSET + 258;
const REPORT_DATA_OFFSET: usize = REPORT_BODY_OFFSET + 320;

// A raw DCAP quote carries the same 432-byte body followed by a `u32`
// signature length and that many signature bytes.
const SIGNATURE_LENGTH_SIZE: usize = 4;

/// A 32-byte enclave measurement (MRENCLAVE or MRSIGNER).
///
/// Serializes to/from a hex string, matching the operator-facing policy
/// format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement(#[serde(with = "hex::serde")] [u8; 32]);

impl Measurement {
    /// Create a measurement from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; 32]> for Measurement {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Measurement {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ConstantTimeEq for Measurement {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl Display for Measurement {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The 64-byte report-data field: an opaque commitment the enclave chose
/// at quote-generation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportData([u8; REPORT_DATA_SIZE]);

impl From<[u8; REPORT_DATA_SIZE]> for ReportData {
    fn from(bytes: [u8; REPORT_DATA_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ReportData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A length-validated enclave quote body.
///
/// Constructed via [`TryFrom`] for the report-embedded form or
/// [`Quote::from_raw_dcap`] for a raw platform quote. Either way the
/// accessors below are total: the buffer is known to hold all fixed
/// offsets before a `Quote` exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    bytes: [u8; QUOTE_BODY_SIZE],
}

/// Decode the quote body embedded in a verification report.
///
/// The input must be exactly [`QUOTE_BODY_SIZE`] bytes. Truncated or
/// oversized input is an error, never zero-padded.
impl TryFrom<&[u8]> for Quote {
    type Error = DecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let body: [u8; QUOTE_BODY_SIZE] =
            bytes.try_into().map_err(|_| DecodeError::QuoteLength {
                expected: QUOTE_BODY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes: body })
    }
}

impl Quote {
    /// Decode the body of a raw DCAP quote.
    ///
    /// A raw quote is the 432-byte body followed by a `u32` declaring the
    /// signature section length. The declared length must account for
    /// every remaining byte; it is validated, not trusted.
    pub fn from_raw_dcap(bytes: &[u8]) -> Result<Self, DecodeError> {
        let minimum = QUOTE_BODY_SIZE + SIGNATURE_LENGTH_SIZE;
        if bytes.len() < minimum {
            return Err(DecodeError::QuoteLength {
                expected: minimum,
                actual: bytes.len(),
            });
        }
        let declared = u32::from_le_bytes(
            bytes[QUOTE_BODY_SIZE..minimum]
                .try_into()
                .expect("slice is the size of a u32"),
        ) as usize;
        let trailing = bytes.len() - minimum;
        if declared != trailing {
            return Err(DecodeError::QuoteSignatureLength(trailing));
        }
        Self::try_from(&bytes[..QUOTE_BODY_SIZE])
    }

    /// Quote structure version.
    pub fn version(&self) -> u16 {
        self.u16_at(0)
    }

    /// EPID group id, for diagnostic correlation only.
    pub fn epid_group_id(&self) -> [u8; 4] {
        self.array_at::<4>(EPID_GROUP_ID_OFFSET)
    }

    /// Quoting-enclave basename, for diagnostic correlation only.
    pub fn basename(&self) -> [u8; 32] {
        self.array_at::<32>(BASENAME_OFFSET)
    }

    /// Hash of the code and data loaded into the enclave.
    pub fn mr_enclave(&self) -> Measurement {
        Measurement(self.array_at::<32>(MR_ENCLAVE_OFFSET))
    }

    /// Hash of the key that signed the enclave binary.
    pub fn mr_signer(&self) -> Measurement {
        Measurement(self.array_at::<32>(MR_SIGNER_OFFSET))
    }

    /// Vendor-assigned product id.
    pub fn isv_prod_id(&self) -> u16 {
        self.u16_at(ISV_PROD_ID_OFFSET)
    }

    /// Vendor-assigned security version number.
    pub fn isv_svn(&self) -> u16 {
        self.u16_at(ISV_SVN_OFFSET)
    }

    /// The 64-byte commitment field set by the enclave.
    pub fn report_data(&self) -> ReportData {
        ReportData(self.array_at::<REPORT_DATA_SIZE>(REPORT_DATA_OFFSET))
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.array_at::<2>(offset))
    }

    fn array_at<const N: usize>(&self, offset: usize) -> [u8; N] {
        self.bytes[offset..offset + N]
            .try_into()
            .expect("offset range is within the validated body")
    }
}
