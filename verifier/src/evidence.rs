// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Attestation evidence as submitted by a worker.
//!
//! Evidence is untrusted input. The types here only carry the bytes;
//! nothing is decoded or believed until the verifier works through it.

use crate::status::CollateralStatus;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// EPID evidence: a signed verification report from the attestation
/// service plus the certificate chain for the report-signing key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpidEvidence {
    /// The verification report JSON, exactly as signed by the service.
    pub verification_report: String,
    /// Base64 of the service's signature over the report JSON.
    pub report_signature: String,
    /// Leaf-first PEM chain for the report-signing key.
    pub signing_certificates: Vec<String>,
}

/// DCAP evidence: a raw platform quote, verified out of process by a
/// quote verification oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcapEvidence {
    /// The raw quote bytes, hex encoded on the wire.
    #[serde(with = "hex::serde")]
    pub raw_quote: Vec<u8>,
}

/// Evidence for one attestation, in whichever scheme the worker used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationEvidence {
    /// EPID attestation via a verification report.
    Epid(EpidEvidence),
    /// DCAP attestation via a raw quote.
    Dcap(DcapEvidence),
}

impl AttestationEvidence {
    /// Total size of the evidence payload in bytes, for input caps.
    pub fn size(&self) -> usize {
        match self {
            AttestationEvidence::Epid(epid) => {
                epid.verification_report.len()
                    + epid.report_signature.len()
                    + epid
                        .signing_certificates
                        .iter()
                        .map(|pem| pem.len())
                        .sum::<usize>()
            }
            AttestationEvidence::Dcap(dcap) => dcap.raw_quote.len(),
        }
    }
}

/// Verdict from a quote verification oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleVerdict {
    /// Collateral status the oracle assigned to the quote.
    pub status: CollateralStatus,
    /// Supplemental data from the verification library, passed through
    /// opaquely for audit logs.
    pub supplemental_data: Vec<u8>,
}

/// Something that can verify a raw DCAP quote against platform
/// collateral, such as an enclave hosting the quote verification library.
///
/// The verifier treats the oracle's answer as the quote's collateral
/// status; whether that status is acceptable stays a local policy
/// decision.
pub trait QuoteVerificationOracle {
    /// Verify `raw_quote` and report its collateral status.
    ///
    /// Returns `None` when the oracle cannot evaluate the quote at all,
    /// which callers must treat as a verification failure.
    fn verify_quote(&self, raw_quote: &[u8]) -> Option<OracleVerdict>;
}
