//! Human-readable and JSON run reports.

use remap_agent::{RemapError, RunOutcome};

/// Human summary of a successful run.
pub fn outcome_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::NothingPending { ia } => format!("{ia}: no remap pending"),
        RunOutcome::Installed {
            ia,
            new_ia,
            active_dir,
            backup_dir,
            confirmed,
        } => {
            let mut out = match new_ia {
                Some(new_ia) => format!("{ia}: remapped to {new_ia}\n"),
                None => format!("{ia}: remapped\n"),
            };
            out.push_str(&format!("  Installed: {}\n", active_dir.display()));
            out.push_str(&format!("  Backup:    {}\n", backup_dir.display()));
            if *confirmed {
                out.push_str("  Coordinator acknowledged completion");
            } else {
                out.push_str("  Coordinator did NOT acknowledge completion");
            }
            out
        }
    }
}

pub fn outcome_json(outcome: &RunOutcome) -> serde_json::Value {
    serde_json::to_value(outcome).unwrap_or_else(|e| {
        serde_json::json!({"error": "internal", "message": e.to_string()})
    })
}

/// JSON error report: `{"error": <kind>, "message": ..., "exit_code": ...}`.
pub fn error_json(err: &RemapError) -> serde_json::Value {
    let mut body = serde_json::json!({
        "error": err.kind(),
        "message": err.to_string(),
        "exit_code": err.exit_code(),
    });
    if let RemapError::Installation {
        backup: Some(backup),
        ..
    } = err
    {
        body["backup"] = serde_json::Value::String(backup.display().to_string());
    }
    body
}
