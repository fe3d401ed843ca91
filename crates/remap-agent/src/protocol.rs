//! Wire types for the Coordinator's remap endpoints.
//!
//! These define the JSON shapes of the challenge poll, solution submission,
//! bundle download and completion confirmation calls.

use remap_common::Ia;
use serde::{Deserialize, Serialize};

/// `GET`/`POST /api/as/remapId/{IA}` — challenge poll and solution submission.
pub fn remap_id_path(ia: &Ia) -> String {
    format!("/api/as/remapId/{ia}")
}

/// `POST /api/as/remapIdDownloadGen/{IA}` — configuration bundle download.
pub fn download_gen_path(ia: &Ia) -> String {
    format!("/api/as/remapIdDownloadGen/{ia}")
}

/// `POST /api/as/remapIdConfirmStatus/{IA}` — completion acknowledgment.
pub fn confirm_status_path(ia: &Ia) -> String {
    format!("/api/as/remapIdConfirmStatus/{ia}")
}

/// Body of the solution submission.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SolutionRequest {
    /// The challenge exactly as the Coordinator sent it (base64).
    pub challenge: String,
    /// Signature over the decoded challenge (base64).
    pub challenge_solution: String,
}

/// Fields the Coordinator returned with an accepted solution, carried to
/// the download and confirmation calls. `error` and `msg` are stripped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionPayload(pub serde_json::Map<String, serde_json::Value>);

impl SessionPayload {
    pub fn from_response(mut map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.remove("error");
        map.remove("msg");
        Self(map)
    }

    /// The identity the AS is remapped to, when the Coordinator reports one.
    pub fn remapped_ia(&self) -> Option<Ia> {
        self.0
            .get("ia")
            .and_then(|v| v.as_str())
            .and_then(|s| Ia::parse(s).ok())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }

    /// Body of the confirmation call: the session fields plus the solved
    /// challenge.
    pub fn confirmation(&self, solution: &SolutionRequest) -> serde_json::Value {
        let mut map = self.0.clone();
        map.insert(
            "challenge".into(),
            serde_json::Value::String(solution.challenge.clone()),
        );
        map.insert(
            "challenge_solution".into(),
            serde_json::Value::String(solution.challenge_solution.clone()),
        );
        serde_json::Value::Object(map)
    }
}

/// Result of running a service-control hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    pub success: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn endpoint_paths_embed_identity() {
        let ia = Ia::parse("17-ffaa:0:1").unwrap();
        assert_eq!(remap_id_path(&ia), "/api/as/remapId/17-ffaa:0:1");
        assert_eq!(download_gen_path(&ia), "/api/as/remapIdDownloadGen/17-ffaa:0:1");
        assert_eq!(
            confirm_status_path(&ia),
            "/api/as/remapIdConfirmStatus/17-ffaa:0:1"
        );
    }

    #[test]
    fn solution_request_uses_wire_names() {
        let req = SolutionRequest {
            challenge: "QUJD".into(),
            challenge_solution: "c2ln".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"challenge": "QUJD", "challenge_solution": "c2ln"})
        );
    }

    #[test]
    fn session_payload_strips_error_fields() {
        let payload = SessionPayload::from_response(map(serde_json::json!({
            "error": false,
            "msg": "",
            "ia": "1-7",
            "pending": false
        })));
        assert_eq!(
            payload.to_value(),
            serde_json::json!({"ia": "1-7", "pending": false})
        );
    }

    #[test]
    fn remapped_ia_parses_string_field() {
        let payload = SessionPayload::from_response(map(serde_json::json!({"ia": "17-ffaa:1:0"})));
        assert_eq!(payload.remapped_ia().unwrap().to_string(), "17-ffaa:1:0");
    }

    #[test]
    fn remapped_ia_ignores_non_string() {
        let payload = SessionPayload::from_response(map(serde_json::json!({"ia": {"I": 1}})));
        assert!(payload.remapped_ia().is_none());
    }

    #[test]
    fn confirmation_carries_solution() {
        let payload = SessionPayload::from_response(map(serde_json::json!({"ia": "1-7"})));
        let body = payload.confirmation(&SolutionRequest {
            challenge: "QUJD".into(),
            challenge_solution: "c2ln".into(),
        });
        assert_eq!(body["ia"], "1-7");
        assert_eq!(body["challenge"], "QUJD");
        assert_eq!(body["challenge_solution"], "c2ln");
    }

    #[test]
    fn hook_result_omits_empty_output() {
        let result = HookResult {
            success: true,
            command: "systemctl start scionlab.target".into(),
            output: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("output").is_none());
    }
}
