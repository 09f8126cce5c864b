// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Certificate-chain anchoring for report signatures.
//!
//! The attestation service signs each report with a key whose certificate
//! chain accompanies the evidence. The chain is only trusted if it roots
//! in a certificate the relying party configured ahead of time; with no
//! root configured, verification fails closed.

use alloc::string::String;
use alloc::vec::Vec;
use const_oid::ObjectIdentifier;
use core::time::Duration;
use p256::ecdsa;
use p256::ecdsa::signature::Verifier;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::sha2::{Digest, Sha256};
use rsa::Pkcs1v15Sign;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::Certificate as X509Certificate;

const OID_PKCS1_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_PKCS1_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_SIG_ECDSA_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

pub type Result<T> = core::result::Result<T, Error>;

/// Error type for decoding and verifying certificates.
#[derive(Debug, displaydoc::Display, PartialEq, Eq)]
pub enum Error {
    /// An error occurred decoding the signature from a certificate
    SignatureDecoding,
    /// The signature does not match with the verifying key
    SignatureVerification,
    /// An error occurred decoding the certificate
    CertificateDecoding(x509_cert::der::Error),
    /// An error occurred decoding the key from a certificate
    KeyDecoding,
    /// The certificate or signature uses an algorithm this verifier does not support
    UnsupportedAlgorithm,
    /// The certificate has expired
    CertificateExpired,
    /// The certificate is not yet valid
    CertificateNotYetValid,
    /// The certificate chain is empty
    EmptyChain,
    /// No trust root has been configured
    NoRootConfigured,
}

impl From<x509_cert::der::Error> for Error {
    fn from(src: x509_cert::der::Error) -> Self {
        Error::CertificateDecoding(src)
    }
}

/// Public key used in PKI signature verification
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PublicKey {
    /// Elliptic curve public key
    Ecdsa(ecdsa::VerifyingKey),
    /// RSA public key
    Rsa(rsa::RsaPublicKey),
}

impl PublicKey {
    /// Verify the `message` and `signature` match this [`PublicKey`]
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        match self {
            PublicKey::Ecdsa(key) => match signature {
                Signature::Ecdsa(sig) => key
                    .verify(message, sig)
                    .map_err(|_| Error::SignatureVerification),
                _ => Err(Error::SignatureVerification),
            },
            PublicKey::Rsa(key) => match signature {
                Signature::Rsa(sig) => {
                    let scheme = Pkcs1v15Sign::new::<Sha256>();
                    let hashed = Sha256::digest(message);
                    key.verify(scheme, &hashed, sig)
                        .map_err(|_| Error::SignatureVerification)
                }
                _ => Err(Error::SignatureVerification),
            },
        }
    }

    /// Verify a detached signature whose algorithm is implied by the key.
    ///
    /// This is the form the attestation service uses for the report body:
    /// raw signature bytes with no algorithm identifier alongside them.
    /// RSA keys expect PKCS#1 v1.5 over SHA-256; EC keys expect an ECDSA
    /// signature in DER or fixed-size form.
    pub fn verify_raw(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = match self {
            PublicKey::Rsa(_) => Signature::Rsa(signature.to_vec()),
            PublicKey::Ecdsa(_) => {
                let sig = ecdsa::Signature::from_der(signature)
                    .or_else(|_| ecdsa::Signature::from_slice(signature))
                    .map_err(|_| Error::SignatureDecoding)?;
                Signature::Ecdsa(sig)
            }
        };
        self.verify(message, &signature)
    }
}

/// Create a [`PublicKey`] from a [`SubjectPublicKeyInfoOwned`]
impl TryFrom<&SubjectPublicKeyInfoOwned> for PublicKey {
    type Error = Error;

    fn try_from(value: &SubjectPublicKeyInfoOwned) -> core::result::Result<Self, Self::Error> {
        let bytes = value
            .subject_public_key
            .as_bytes()
            .ok_or(Error::KeyDecoding)?;
        match value.algorithm.oid {
            OID_EC_PUBLIC_KEY => {
                let key =
                    ecdsa::VerifyingKey::from_sec1_bytes(bytes).map_err(|_| Error::KeyDecoding)?;
                Ok(PublicKey::Ecdsa(key))
            }
            OID_PKCS1_RSA_ENCRYPTION => {
                let key =
                    rsa::RsaPublicKey::from_pkcs1_der(bytes).map_err(|_| Error::KeyDecoding)?;
                Ok(PublicKey::Rsa(key))
            }
            _ => Err(Error::UnsupportedAlgorithm),
        }
    }
}

/// Signature used in PKI verification
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Signature {
    /// Elliptic curve signature
    Ecdsa(ecdsa::Signature),
    /// RSA signature
    Rsa(Vec<u8>),
}

impl Signature {
    /// Create a [`Signature`] from the `algorithm` and `signature` bytes
    pub fn try_from_algorithm_and_signature(
        algorithm: &AlgorithmIdentifierOwned,
        signature: &[u8],
    ) -> Result<Self> {
        match algorithm.oid {
            OID_SIG_ECDSA_WITH_SHA256 => {
                let sig =
                    ecdsa::Signature::from_der(signature).map_err(|_| Error::SignatureDecoding)?;
                Ok(Signature::Ecdsa(sig))
            }
            OID_PKCS1_SHA256_WITH_RSA => Ok(Signature::Rsa(signature.to_vec())),
            _ => Err(Error::UnsupportedAlgorithm),
        }
    }
}

/// A certificate whose signature has not been verified.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnverifiedCertificate {
    certificate: X509Certificate,
    // The signature and key are persisted here since they are fallible
    // operations and it's more ergonomic to fail fast than fail later for a
    // bad key or signature
    signature: Signature,
    key: PublicKey,
}

/// A certificate whose signature has been verified against its issuer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VerifiedCertificate {
    key: PublicKey,
}

impl VerifiedCertificate {
    /// The subject public key of the verified certificate.
    pub fn public_key(&self) -> PublicKey {
        self.key.clone()
    }
}

impl UnverifiedCertificate {
    /// Decode a certificate from its PEM text.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let certificate = X509Certificate::from_pem(pem.trim().as_bytes())?;
        Self::try_from(certificate)
    }

    /// Verify the certificate signature and validity window.
    ///
    /// `key` is the issuer's public key and `unix_time` the evaluation
    /// time, which must fall inside the certificate's validity period.
    pub fn verify(&self, key: &PublicKey, unix_time: Duration) -> Result<VerifiedCertificate> {
        self.verify_time(unix_time)?;
        let tbs_contents = self.certificate.tbs_certificate.to_der()?;
        key.verify(&tbs_contents, &self.signature)?;
        Ok(VerifiedCertificate {
            key: self.key.clone(),
        })
    }

    /// Verify a self-signed certificate, such as a configured trust root.
    pub fn verify_self_signed(&self, unix_time: Duration) -> Result<VerifiedCertificate> {
        self.verify(&self.key, unix_time)
    }

    fn verify_time(&self, unix_time: Duration) -> Result<()> {
        let validity = &self.certificate.tbs_certificate.validity;
        if unix_time < validity.not_before.to_unix_duration() {
            return Err(Error::CertificateNotYetValid);
        }
        if unix_time > validity.not_after.to_unix_duration() {
            return Err(Error::CertificateExpired);
        }
        Ok(())
    }
}

/// Convert a DER-encoded certificate into an [`UnverifiedCertificate`].
impl TryFrom<&[u8]> for UnverifiedCertificate {
    type Error = Error;

    fn try_from(der_bytes: &[u8]) -> core::result::Result<Self, Self::Error> {
        let certificate = X509Certificate::from_der(der_bytes)?;
        Self::try_from(certificate)
    }
}

impl TryFrom<X509Certificate> for UnverifiedCertificate {
    type Error = Error;

    fn try_from(certificate: X509Certificate) -> core::result::Result<Self, Self::Error> {
        let signature_bytes = certificate
            .signature
            .as_bytes()
            .ok_or(Error::SignatureDecoding)?;
        let signature = Signature::try_from_algorithm_and_signature(
            &certificate.signature_algorithm,
            signature_bytes,
        )?;
        let key = PublicKey::try_from(&certificate.tbs_certificate.subject_public_key_info)?;
        Ok(UnverifiedCertificate {
            certificate,
            signature,
            key,
        })
    }
}

/// The relying party's trust root for report-signing chains.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TrustAnchor {
    /// Chains must terminate at this self-signed PEM certificate.
    RequireRoot(String),
    /// No root was configured. Every chain is rejected.
    NoRootConfigured,
}

/// An X509 certificate chain, ordered leaf first as presented in evidence.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CertificateChain {
    certificates: Vec<UnverifiedCertificate>,
}

impl CertificateChain {
    /// Create a chain from leaf-first certificates.
    ///
    /// A chain without a valid path to the anchor will result in errors
    /// from [`CertificateChain::leaf_key`].
    pub fn new(certificates: Vec<UnverifiedCertificate>) -> Self {
        Self { certificates }
    }

    /// Decode a chain from leaf-first PEM certificates.
    pub fn from_pems<S: AsRef<str>>(pems: &[S]) -> Result<Self> {
        let certificates = pems
            .iter()
            .map(|pem| UnverifiedCertificate::from_pem(pem.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(certificates))
    }

    /// Verify the chain against the anchor and return the leaf's key.
    ///
    /// The anchor's root is first verified as self-signed, then each
    /// certificate is verified against its issuer walking from the anchor
    /// down to the leaf. Every certificate must contain `unix_time` in its
    /// validity window. A chain that repeats the root certificate still
    /// verifies, since the root signs itself.
    pub fn leaf_key(&self, anchor: &TrustAnchor, unix_time: Duration) -> Result<PublicKey> {
        let root_pem = match anchor {
            TrustAnchor::RequireRoot(pem) => pem,
            TrustAnchor::NoRootConfigured => return Err(Error::NoRootConfigured),
        };
        if self.certificates.is_empty() {
            return Err(Error::EmptyChain);
        }
        let root = UnverifiedCertificate::from_pem(root_pem)?.verify_self_signed(unix_time)?;
        let mut key = root.public_key();
        for cert in self.certificates.iter().rev() {
            let verified_cert = cert.verify(&key, unix_time)?;
            key = verified_cert.public_key();
        }
        Ok(key)
    }
}
