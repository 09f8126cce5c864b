// Copyright (c) 2024 The Trusted Compute Framework Authors

//! The attestation-service verification report.
//!
//! The report is a JSON document produced by the attestation service and
//! signed with the service's report-signing key. Field names follow the
//! service's wire format, which mixes snake_case and camelCase.

use crate::error::DecodeError;
use crate::quote::Quote;
use alloc::string::String;
use alloc::vec::Vec;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

/// Wire-format view of the report. Every field is optional here so that a
/// missing required field can be reported by name instead of a generic
/// serde error.
#[derive(Deserialize)]
struct RawReport {
    id: Option<String>,
    timestamp: Option<String>,
    version: Option<u32>,
    #[serde(rename = "isvEnclaveQuoteStatus")]
    isv_enclave_quote_status: Option<String>,
    #[serde(rename = "isvEnclaveQuoteBody")]
    isv_enclave_quote_body: Option<String>,
    #[serde(rename = "revocationReason")]
    revocation_reason: Option<u64>,
    #[serde(rename = "pseManifestStatus")]
    pse_manifest_status: Option<String>,
    #[serde(rename = "pseManifestHash")]
    pse_manifest_hash: Option<String>,
    #[serde(rename = "platformInfoBlob")]
    platform_info_blob: Option<String>,
    nonce: Option<String>,
    #[serde(rename = "epidPseudonym")]
    epid_pseudonym: Option<String>,
    #[serde(rename = "advisoryURL")]
    advisory_url: Option<String>,
    #[serde(rename = "advisoryIDs")]
    advisory_ids: Option<Vec<String>>,
}

/// A decoded verification report.
///
/// Decoding validates presence of the required fields only. Whether the
/// report should be *trusted* is decided later, after its signature checks
/// out against an anchored certificate chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    /// Report id assigned by the attestation service.
    pub id: String,
    /// Time the service produced the report, as an opaque string.
    pub timestamp: Option<String>,
    /// Report format version.
    pub version: Option<u32>,
    /// Quote status string, e.g. `OK` or `GROUP_OUT_OF_DATE`.
    pub isv_enclave_quote_status: String,
    /// Base64 of the quote body the service evaluated.
    pub isv_enclave_quote_body: String,
    /// EPID revocation reason code, present only for revoked groups.
    pub revocation_reason: Option<u64>,
    /// Platform-services manifest status, when a PSE manifest was sent.
    pub pse_manifest_status: Option<String>,
    /// Hash of the PSE manifest, when one was sent.
    pub pse_manifest_hash: Option<String>,
    /// TLV blob describing platform state, passed through opaquely.
    pub platform_info_blob: Option<String>,
    /// The relying party's freshness nonce, echoed by the service.
    pub nonce: String,
    /// Linkable pseudonym for the attesting platform.
    pub epid_pseudonym: String,
    /// URL of the advisory list for the platform's TCB level.
    pub advisory_url: Option<String>,
    /// Advisory ids applicable to the platform's TCB level.
    pub advisory_ids: Option<Vec<String>>,
}

impl VerificationReport {
    /// Decode a report from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        let raw: RawReport = serde_json::from_str(json)?;
        Ok(Self {
            id: raw.id.ok_or(DecodeError::MissingField("id"))?,
            timestamp: raw.timestamp,
            version: raw.version,
            isv_enclave_quote_status: raw
                .isv_enclave_quote_status
                .ok_or(DecodeError::MissingField("isvEnclaveQuoteStatus"))?,
            isv_enclave_quote_body: raw
                .isv_enclave_quote_body
                .ok_or(DecodeError::MissingField("isvEnclaveQuoteBody"))?,
            revocation_reason: raw.revocation_reason,
            pse_manifest_status: raw.pse_manifest_status,
            pse_manifest_hash: raw.pse_manifest_hash,
            platform_info_blob: raw.platform_info_blob,
            nonce: raw.nonce.ok_or(DecodeError::MissingField("nonce"))?,
            epid_pseudonym: raw
                .epid_pseudonym
                .ok_or(DecodeError::MissingField("epidPseudonym"))?,
            advisory_url: raw.advisory_url,
            advisory_ids: raw.advisory_ids,
        })
    }

    /// Decode the quote body embedded in the report.
    pub fn quote(&self) -> Result<Quote, DecodeError> {
        let bytes = STANDARD.decode(&self.isv_enclave_quote_body)?;
        Quote::try_from(bytes.as_slice())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::quote::{Measurement, QUOTE_BODY_SIZE};
    use alloc::format;
    use alloc::string::ToString;
    use assert_matches::assert_matches;
    use yare::parameterized;

    fn report_json(quote_body_b64: &str) -> String {
        format!(
            r#"{{
                "id": "142090828149453720542199954221331163261",
                "timestamp": "2024-03-12T20:45:11.329821",
                "version": 4,
                "isvEnclaveQuoteStatus": "OK",
                "isvEnclaveQuoteBody": "{quote_body_b64}",
                "nonce": "35e85d20586a5a21",
                "epidPseudonym": "amNkW021oc3do9Vc="
            }}"#
        )
    }

    #[test]
    fn decodes_a_minimal_report() {
        let report = VerificationReport::from_json(&report_json("AAECAwQ=")).expect("valid json");
        assert_eq!(report.id, "142090828149453720542199954221331163261");
        assert_eq!(report.isv_enclave_quote_status, "OK");
        assert_eq!(report.nonce, "35e85d20586a5a21");
        assert_eq!(report.version, Some(4));
        assert_eq!(report.revocation_reason, None);
        assert_eq!(report.advisory_ids, None);
    }

    #[test]
    fn decodes_optional_advisory_and_platform_fields() {
        let json = r#"{
            "id": "1",
            "isvEnclaveQuoteStatus": "GROUP_OUT_OF_DATE",
            "isvEnclaveQuoteBody": "AAECAwQ=",
            "nonce": "abcd",
            "epidPseudonym": "xyz=",
            "platformInfoBlob": "1502006504000900",
            "advisoryURL": "https://security-center.intel.com",
            "advisoryIDs": ["INTEL-SA-00219", "INTEL-SA-00293"]
        }"#;
        let report = VerificationReport::from_json(json).expect("valid json");
        assert_eq!(
            report.platform_info_blob.as_deref(),
            Some("1502006504000900")
        );
        assert_eq!(
            report.advisory_url.as_deref(),
            Some("https://security-center.intel.com")
        );
        assert_eq!(
            report.advisory_ids,
            Some(alloc::vec![
                "INTEL-SA-00219".to_string(),
                "INTEL-SA-00293".to_string()
            ])
        );
    }

    #[parameterized(
        id = { "id" },
        status = { "isvEnclaveQuoteStatus" },
        quote_body = { "isvEnclaveQuoteBody" },
        nonce = { "nonce" },
        pseudonym = { "epidPseudonym" },
    )]
    fn missing_required_field_is_named(field: &str) {
        let full = report_json("AAECAwQ=");
        let value: serde_json::Value = serde_json::from_str(&full).expect("valid json");
        let mut object = value.as_object().expect("object").clone();
        object.remove(field);
        let json = serde_json::to_string(&object).expect("serialize");

        assert_matches!(
            VerificationReport::from_json(&json),
            Err(DecodeError::MissingField(name)) if name == field
        );
    }

    #[test]
    fn null_required_field_is_treated_as_missing() {
        let json = r#"{
            "id": null,
            "isvEnclaveQuoteStatus": "OK",
            "isvEnclaveQuoteBody": "AAECAwQ=",
            "nonce": "abcd",
            "epidPseudonym": "xyz="
        }"#;
        assert_matches!(
            VerificationReport::from_json(json),
            Err(DecodeError::MissingField("id"))
        );
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert_matches!(
            VerificationReport::from_json("not json"),
            Err(DecodeError::Json(_))
        );
    }

    #[test]
    fn quote_body_decodes_through_the_report() {
        let body = crate::quote::test::quote_body();
        let report =
            VerificationReport::from_json(&report_json(&STANDARD.encode(body))).expect("valid");
        let quote = report.quote().expect("valid quote body");
        assert_eq!(quote.mr_enclave(), Measurement::new([0x11; 32]));
    }

    #[test]
    fn quote_body_with_bad_base64_is_rejected() {
        let report =
            VerificationReport::from_json(&report_json("!!not-base64!!")).expect("valid json");
        assert_matches!(report.quote(), Err(DecodeError::Base64(_)));
    }

    #[test]
    fn quote_body_with_wrong_length_is_rejected() {
        let report = VerificationReport::from_json(&report_json("AAECAwQ=")).expect("valid json");
        assert_matches!(
            report.quote(),
            Err(DecodeError::QuoteLength { expected, actual: 5 })
                if expected == QUOTE_BODY_SIZE
        );
    }
}
