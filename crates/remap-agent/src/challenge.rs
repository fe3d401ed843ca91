//! Challenge-response handshake with the Coordinator.
//!
//! 1. Poll for a pending challenge
//! 2. Sign it with the AS key (through the injected signer)
//! 3. Verify the signature locally against the derived public key
//! 4. Submit the solution and collect the session payload

use remap_client::{Method, RequestExecutor};
use remap_common::encoding::{b64_decode, b64_encode};
use remap_common::Ia;
use remap_crypto::{ChallengeSigner, KeyMaterial};
use serde_json::{Map, Value};

use crate::error::RemapError;
use crate::protocol::{remap_id_path, SessionPayload, SolutionRequest};

/// Outcome of polling for a challenge.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// Nothing to do for this identity.
    NonePending,
    /// A challenge is waiting; `encoded` is kept verbatim for submission.
    Challenge { encoded: String, bytes: Vec<u8> },
}

/// Poll the Coordinator for a pending remap challenge.
pub fn poll(exec: &RequestExecutor, ia: &Ia) -> Result<PollResult, RemapError> {
    let (status, json) = exec.execute_json(Method::Get, &remap_id_path(ia), None)?;
    let body = as_object(&json, status)?;
    check_server_error(body)?;

    let pending = body
        .get("pending")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            RemapError::Protocol(format!("HTTP {status}: poll response missing boolean \"pending\""))
        })?;

    if !pending {
        tracing::info!(ia = %ia, "No remap pending");
        return Ok(PollResult::NonePending);
    }

    let encoded = body
        .get("challenge")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            RemapError::Protocol("pending challenge without a \"challenge\" string".into())
        })?
        .to_string();
    let bytes = b64_decode(&encoded)
        .map_err(|e| RemapError::Protocol(format!("challenge is not base64: {e}")))?;

    tracing::info!(ia = %ia, len = bytes.len(), "Remap challenge received");
    Ok(PollResult::Challenge { encoded, bytes })
}

/// Sign `challenge` with `key`. Pure; the signer decides the algorithm.
pub fn solve<S: ChallengeSigner + ?Sized>(
    signer: &S,
    challenge: &[u8],
    key: &KeyMaterial,
) -> Result<Vec<u8>, RemapError> {
    signer.sign(challenge, key).map_err(RemapError::from)
}

/// Check a solution against the public key derived from `key` before it
/// is sent. A solution that does not verify would burn the challenge.
pub fn self_verify<S: ChallengeSigner + ?Sized>(
    signer: &S,
    challenge: &[u8],
    solution: &[u8],
    key: &KeyMaterial,
) -> Result<(), RemapError> {
    let public_key = signer.public_key(key)?;
    if signer.verify(challenge, solution, &public_key) {
        tracing::debug!("Challenge solution verified locally");
        Ok(())
    } else {
        Err(RemapError::Crypto(
            "challenge solution does not verify against the key's own public key".into(),
        ))
    }
}

/// Build the submission body from the challenge as received and the raw
/// solution.
pub fn solution_request(challenge_encoded: &str, solution: &[u8]) -> SolutionRequest {
    SolutionRequest {
        challenge: challenge_encoded.to_string(),
        challenge_solution: b64_encode(solution),
    }
}

/// Submit a solved challenge. Once sent, a solution is never resent.
pub fn submit(
    exec: &RequestExecutor,
    ia: &Ia,
    request: &SolutionRequest,
) -> Result<SessionPayload, RemapError> {
    let body = serde_json::to_value(request)
        .map_err(|e| RemapError::Protocol(format!("cannot encode solution: {e}")))?;
    let (status, json) = exec.execute_json(Method::Post, &remap_id_path(ia), Some(&body))?;
    let body = as_object(&json, status)?;

    let error = body.get("error").and_then(Value::as_bool).ok_or_else(|| {
        RemapError::Protocol(format!("HTTP {status}: submit response missing boolean \"error\""))
    })?;
    if error {
        return Err(RemapError::ServerRejected(server_message(body)));
    }

    let payload = SessionPayload::from_response(body.clone());
    match payload.remapped_ia() {
        Some(new_ia) => tracing::info!(ia = %ia, new_ia = %new_ia, "Challenge solution accepted"),
        None => tracing::info!(ia = %ia, "Challenge solution accepted"),
    }
    Ok(payload)
}

fn as_object(json: &Value, status: u16) -> Result<&Map<String, Value>, RemapError> {
    json.as_object()
        .ok_or_else(|| RemapError::Protocol(format!("HTTP {status}: expected a JSON object")))
}

/// A poll answered with `"error": true` means the Coordinator refused to
/// talk about this identity at all.
fn check_server_error(body: &Map<String, Value>) -> Result<(), RemapError> {
    if body.get("error").and_then(Value::as_bool) == Some(true) {
        return Err(RemapError::ServerRejected(server_message(body)));
    }
    Ok(())
}

fn server_message(body: &Map<String, Value>) -> String {
    body.get("msg")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("unspecified")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use remap_crypto::{CryptoError, Ed25519Signer};

    /// Signer that echoes the data reversed; verify checks that shape.
    struct ReverseSigner;

    impl ChallengeSigner for ReverseSigner {
        fn sign(&self, data: &[u8], _key: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
            Ok(data.iter().rev().copied().collect())
        }

        fn verify(&self, data: &[u8], signature: &[u8], _public_key: &[u8]) -> bool {
            data.iter().rev().copied().collect::<Vec<_>>() == signature
        }

        fn public_key(&self, _key: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
            Ok(vec![])
        }
    }

    /// Signer whose signatures never verify.
    struct BrokenSigner;

    impl ChallengeSigner for BrokenSigner {
        fn sign(&self, _data: &[u8], _key: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
            Ok(vec![0; 64])
        }

        fn verify(&self, _data: &[u8], _signature: &[u8], _public_key: &[u8]) -> bool {
            false
        }

        fn public_key(&self, _key: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
            Ok(vec![0; 32])
        }
    }

    #[test]
    fn solve_delegates_to_signer() {
        let key = KeyMaterial::from_bytes(vec![1; 32]);
        let solution = solve(&ReverseSigner, b"ABC", &key).unwrap();
        assert_eq!(solution, b"CBA");
    }

    #[test]
    fn ed25519_solution_verifies_with_public_key() {
        let signer = Ed25519Signer;
        let key = KeyMaterial::from_bytes(vec![42; 32]);
        let solution = solve(&signer, b"ABC", &key).unwrap();
        let public = signer.public_key(&key).unwrap();
        assert!(signer.verify(b"ABC", &solution, &public));
        assert!(self_verify(&signer, b"ABC", &solution, &key).is_ok());
    }

    #[test]
    fn self_verify_rejects_bad_solution() {
        let key = KeyMaterial::from_bytes(vec![1; 32]);
        let err = self_verify(&BrokenSigner, b"ABC", &[0; 64], &key).unwrap_err();
        assert!(matches!(err, RemapError::Crypto(_)));
    }

    #[test]
    fn solution_request_keeps_challenge_verbatim() {
        let req = solution_request("QUJD", b"sig");
        assert_eq!(req.challenge, "QUJD");
        assert_eq!(req.challenge_solution, "c2ln");
    }

    #[test]
    fn server_message_defaults_when_missing() {
        let body = serde_json::json!({"error": true});
        assert_eq!(server_message(body.as_object().unwrap()), "unspecified");
    }

    #[test]
    fn check_server_error_passes_false() {
        let body = serde_json::json!({"error": false, "pending": false});
        assert!(check_server_error(body.as_object().unwrap()).is_ok());
    }

    #[test]
    fn check_server_error_surfaces_message() {
        let body = serde_json::json!({"error": true, "msg": "Could not find AS with IA 1-7"});
        let err = check_server_error(body.as_object().unwrap()).unwrap_err();
        match err {
            RemapError::ServerRejected(msg) => assert!(msg.contains("Could not find AS")),
            other => panic!("expected ServerRejected, got: {other}"),
        }
    }
}
