//! Nested password-context token decryption.
//!
//! The replacement tenant wraps the submitted password twice: an encrypted
//! outer envelope (compact JWE, key wrapped with RSA-OAEP for the public
//! key registered with the tenant, content under AES-GCM) around an inner
//! unsigned compact JWS whose payload is a JSON object carrying the
//! password and a single-use nonce. Decoding runs in two strict steps —
//! outer decrypt, then inner decode — and any failure at either step is a
//! tagged [`DecryptError`]; there is no partial success.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use serde::Deserialize;
use tracing::debug;

use crate::context::PasswordContext;

/// GCM nonce length in bytes.
const IV_LENGTH: usize = 12;

/// GCM authentication tag length in bytes.
const TAG_LENGTH: usize = 16;

/// Why a password-context token failed to decode.
///
/// One tagged kind per decode stage, composed with `?` instead of
/// exception-style control flow. The webhook maps every kind to the same
/// block decision; the kinds exist for internal logging.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    /// The outer envelope is not a well-formed compact JWE.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope names an algorithm this decryptor does not support.
    #[error("unsupported algorithm: {alg}")]
    UnsupportedAlgorithm { alg: String },

    /// The private key PEM could not be imported.
    #[error("private key import failed: {0}")]
    KeyImport(String),

    /// The content key could not be unwrapped with the supplied private
    /// key. Carries no detail so the error cannot act as a padding oracle.
    #[error("content key unwrap failed")]
    KeyUnwrap,

    /// Authenticated decryption of the envelope content failed.
    #[error("payload decryption failed")]
    PayloadDecrypt,

    /// The inner payload is not a well-formed unsigned token.
    #[error("malformed inner payload: {0}")]
    MalformedInner(String),

    /// The decoded payload is missing a required field.
    #[error("payload field missing: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    alg: String,
    enc: String,
}

#[derive(Debug, Deserialize)]
struct InnerPayload {
    #[serde(rename = "user-password")]
    user_password: Option<String>,
    nonce: Option<String>,
}

/// Decrypts nested password-context tokens.
///
/// Holds no key state: the private key is supplied per invocation by the
/// caller, which sources it from the key cache.
pub struct PasswordContextDecryptor;

impl PasswordContextDecryptor {
    /// Recovers the password context from a nested token.
    pub fn decrypt(token: &str, private_key_pem: &str) -> Result<PasswordContext, DecryptError> {
        let inner = Self::decrypt_envelope(token, private_key_pem)?;
        debug!(inner_len = inner.len(), "envelope decrypted, decoding inner payload");
        Self::decode_inner(&inner)
    }

    /// Step 1: open the outer JWE with the RSA private key.
    fn decrypt_envelope(token: &str, private_key_pem: &str) -> Result<String, DecryptError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 5 {
            return Err(DecryptError::MalformedEnvelope(format!(
                "expected 5 segments, found {}",
                parts.len()
            )));
        }

        let header_bytes = decode_segment(parts[0], "header")?;
        let header: EnvelopeHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| DecryptError::MalformedEnvelope(format!("bad header: {e}")))?;

        let encrypted_key = decode_segment(parts[1], "encrypted key")?;
        let iv = decode_segment(parts[2], "iv")?;
        let ciphertext = decode_segment(parts[3], "ciphertext")?;
        let tag = decode_segment(parts[4], "tag")?;

        if iv.len() != IV_LENGTH || tag.len() != TAG_LENGTH {
            return Err(DecryptError::MalformedEnvelope(
                "unexpected iv or tag length".to_string(),
            ));
        }

        let key = import_private_key(private_key_pem)?;
        let padding = match header.alg.as_str() {
            "RSA-OAEP" => Oaep::new::<sha1::Sha1>(),
            "RSA-OAEP-256" => Oaep::new::<sha2::Sha256>(),
            other => {
                return Err(DecryptError::UnsupportedAlgorithm {
                    alg: other.to_string(),
                })
            }
        };
        let cek = key
            .decrypt(padding, &encrypted_key)
            .map_err(|_| DecryptError::KeyUnwrap)?;

        // AAD for the content is the protected header exactly as it
        // appeared on the wire.
        let aad = parts[0].as_bytes();
        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);
        let payload = Payload {
            msg: &sealed,
            aad,
        };

        let plaintext = match header.enc.as_str() {
            "A256GCM" => Aes256Gcm::new_from_slice(&cek)
                .map_err(|_| DecryptError::PayloadDecrypt)?
                .decrypt(Nonce::from_slice(&iv), payload),
            "A128GCM" => Aes128Gcm::new_from_slice(&cek)
                .map_err(|_| DecryptError::PayloadDecrypt)?
                .decrypt(Nonce::from_slice(&iv), payload),
            other => {
                return Err(DecryptError::UnsupportedAlgorithm {
                    alg: other.to_string(),
                })
            }
        }
        .map_err(|_| DecryptError::PayloadDecrypt)?;

        String::from_utf8(plaintext).map_err(|_| DecryptError::PayloadDecrypt)
    }

    /// Step 2: decode the inner unsigned token and pull out the fields.
    fn decode_inner(inner: &str) -> Result<PasswordContext, DecryptError> {
        let parts: Vec<&str> = inner.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(DecryptError::MalformedInner(format!(
                "expected 2 or 3 segments, found {}",
                parts.len()
            )));
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| DecryptError::MalformedInner(format!("bad payload encoding: {e}")))?;
        let payload: InnerPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| DecryptError::MalformedInner(format!("bad payload json: {e}")))?;

        let password = payload
            .user_password
            .filter(|p| !p.is_empty())
            .ok_or(DecryptError::MissingField("user-password"))?;

        Ok(PasswordContext {
            password,
            nonce: payload.nonce,
        })
    }
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, DecryptError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| DecryptError::MalformedEnvelope(format!("bad {what} encoding: {e}")))
}

pub(crate) fn import_private_key(pem: &str) -> Result<RsaPrivateKey, DecryptError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| DecryptError::KeyImport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key_pair_for_tests;
    use rand::RngCore;
    use rsa::pkcs8::DecodePublicKey;
    use rsa::RsaPublicKey;
    use serde_json::json;

    /// Builds a nested token the way the replacement tenant does: inner
    /// unsigned token, then a compact JWE around it.
    fn encrypt_context(password: &str, nonce: &str, public_key_pem: &str) -> String {
        let inner_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let inner_payload =
            URL_SAFE_NO_PAD.encode(json!({ "user-password": password, "nonce": nonce }).to_string());
        let inner = format!("{inner_header}.{inner_payload}.");

        let header = r#"{"alg":"RSA-OAEP","enc":"A256GCM"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);

        let mut cek = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut cek);
        let mut iv = [0u8; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new_from_slice(&cek).unwrap();
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: inner.as_bytes(),
                    aad: header_b64.as_bytes(),
                },
            )
            .unwrap();
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);

        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).unwrap();
        let encrypted_key = public_key
            .encrypt(&mut rand::thread_rng(), Oaep::new::<sha1::Sha1>(), &cek)
            .unwrap();

        format!(
            "{}.{}.{}.{}.{}",
            header_b64,
            URL_SAFE_NO_PAD.encode(encrypted_key),
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag),
        )
    }

    #[test]
    fn round_trips_password_and_nonce() {
        let (private_pem, public_pem) = generate_key_pair_for_tests(2048);
        let token = encrypt_context("Abcdef1!", "nonce-123", &public_pem);

        let ctx = PasswordContextDecryptor::decrypt(&token, &private_pem).unwrap();
        assert_eq!(ctx.password, "Abcdef1!");
        assert_eq!(ctx.nonce.as_deref(), Some("nonce-123"));
    }

    #[test]
    fn corrupting_any_envelope_byte_fails_decryption() {
        let (private_pem, public_pem) = generate_key_pair_for_tests(2048);
        let token = encrypt_context("Abcdef1!", "nonce-123", &public_pem);

        // Flip one character in each of the four binary segments in turn.
        for segment_index in 1..=4 {
            let mut parts: Vec<String> = token.split('.').map(String::from).collect();
            let segment = &mut parts[segment_index];
            let mut bytes = segment.clone().into_bytes();
            let target = bytes.len() / 2;
            bytes[target] = if bytes[target] == b'A' { b'B' } else { b'A' };
            *segment = String::from_utf8(bytes).unwrap();
            let corrupted = parts.join(".");

            let result = PasswordContextDecryptor::decrypt(&corrupted, &private_pem);
            assert!(
                result.is_err(),
                "corruption in segment {segment_index} must fail"
            );
        }
    }

    #[test]
    fn wrong_key_fails_closed() {
        let (_, public_pem) = generate_key_pair_for_tests(2048);
        let (other_private, _) = generate_key_pair_for_tests(2048);
        let token = encrypt_context("Abcdef1!", "n", &public_pem);

        let err = PasswordContextDecryptor::decrypt(&token, &other_private).unwrap_err();
        assert!(matches!(err, DecryptError::KeyUnwrap));
    }

    #[test]
    fn malformed_envelope_shapes_are_rejected() {
        let (private_pem, _) = generate_key_pair_for_tests(2048);
        assert!(matches!(
            PasswordContextDecryptor::decrypt("only.two", &private_pem),
            Err(DecryptError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            PasswordContextDecryptor::decrypt("не-base64.a.b.c.d", &private_pem),
            Err(DecryptError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn unsupported_algorithm_is_tagged() {
        let (private_pem, _) = generate_key_pair_for_tests(2048);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"dir","enc":"A256GCM"}"#);
        let seg = URL_SAFE_NO_PAD.encode([0u8; 16]);
        let iv = URL_SAFE_NO_PAD.encode([0u8; IV_LENGTH]);
        let tag = URL_SAFE_NO_PAD.encode([0u8; TAG_LENGTH]);
        let token = format!("{header}.{seg}.{iv}.{seg}.{tag}");
        assert!(matches!(
            PasswordContextDecryptor::decrypt(&token, &private_pem),
            Err(DecryptError::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn missing_password_field_is_tagged() {
        let err = PasswordContextDecryptor::decode_inner(&format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(json!({ "nonce": "n" }).to_string()),
        ))
        .unwrap_err();
        assert!(matches!(err, DecryptError::MissingField("user-password")));
    }

    #[test]
    fn inner_without_trailing_signature_segment_decodes() {
        let inner = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(json!({ "user-password": "p", "nonce": "n" }).to_string()),
        );
        let ctx = PasswordContextDecryptor::decode_inner(&inner).unwrap();
        assert_eq!(ctx.password, "p");
    }
}
