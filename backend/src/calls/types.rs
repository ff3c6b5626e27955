//! Call orchestration types
//!
//! Domain types shared by the orchestrator, the provider clients and the
//! HTTP handlers. Provider wire formats live next to their clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Context handed to the voice assistant at call time
///
/// Serialized with camelCase keys, which is what the assistant templates
/// reference. Inbound payloads may use either spelling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallVariables {
    /// What the caller is asking about
    #[serde(default, alias = "service_description", skip_serializing_if = "Option::is_none")]
    pub service_description: Option<String>,
    /// Preferred time window for an appointment
    #[serde(default, alias = "time_window", skip_serializing_if = "Option::is_none")]
    pub time_window: Option<String>,
    /// Who the assistant should ask for
    #[serde(default, alias = "contact_name", skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    /// Email address to confirm with the contact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Number the contact can call back on
    #[serde(default, alias = "callback_number", skip_serializing_if = "Option::is_none")]
    pub callback_number: Option<String>,
    /// Any other template variables, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Request to place one outbound call
///
/// Every identifier is optional; omitted values fall back to the configured
/// defaults at submission time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallRequest {
    /// Number to dial
    #[serde(default)]
    pub customer_number: Option<String>,
    /// Outgoing-number identifier override
    #[serde(default)]
    pub phone_number_id: Option<String>,
    /// Assistant identifier override
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// Call-time context for the assistant
    #[serde(default)]
    pub variables: CallVariables,
}

/// A call request with every identifier resolved
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCall {
    /// Assistant that runs the conversation
    pub assistant_id: String,
    /// Outgoing number the call is placed from
    pub phone_number_id: String,
    /// Number being dialled
    pub customer_number: String,
    /// Call-time context
    pub variables: CallVariables,
}

/// Opaque provider-issued call identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallHandle(String);

impl CallHandle {
    /// Wrap a provider call id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Call status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    /// Scheduled for later
    Scheduled,
    /// Accepted, not yet dialling
    Queued,
    /// Dialling the customer
    Ringing,
    /// Conversation under way
    InProgress,
    /// Being transferred
    Forwarding,
    /// Call finished
    Ended,
    /// Call could not be completed
    Failed,
    /// A status this service doesn't know about
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    /// Whether no further transitions can follow this status
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Failed)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallStatus::Scheduled => "scheduled",
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Forwarding => "forwarding",
            CallStatus::Ended => "ended",
            CallStatus::Failed => "failed",
            CallStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One poll's view of a call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSnapshot {
    /// Current status
    pub status: CallStatus,
    /// Raw transcript text, if the provider has one yet
    pub transcript: Option<String>,
    /// Post-call summary, if analysed
    pub summary: Option<String>,
    /// Provider's reason for ending the call
    pub ended_reason: Option<String>,
    /// When the call was connected
    pub started_at: Option<DateTime<Utc>>,
    /// When the call ended
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallSnapshot {
    /// Snapshot carrying only a status
    pub fn with_status(status: CallStatus) -> Self {
        Self {
            status,
            transcript: None,
            summary: None,
            ended_reason: None,
            started_at: None,
            ended_at: None,
        }
    }
}

/// Who spoke an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The voice assistant
    Assistant,
    /// The person being called
    Customer,
    /// Text with no recognisable speaker
    Unknown,
}

/// One turn of the call transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    /// Who spoke
    pub speaker: Speaker,
    /// What was said
    pub text: String,
}

/// Final outcome of a call
///
/// Only built once a terminal status has been observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallResult {
    /// Provider call id
    pub call_id: CallHandle,
    /// Terminal status (`ended` or `failed`)
    pub status: CallStatus,
    /// Ordered transcript, when the provider produced one
    pub transcript: Option<Vec<Utterance>>,
    /// Post-call summary
    pub summary: Option<String>,
    /// Provider's reason for ending the call
    pub ended_reason: Option<String>,
    /// When the call was connected
    pub started_at: Option<DateTime<Utc>>,
    /// When the call ended
    pub ended_at: Option<DateTime<Utc>>,
    /// Number of status polls it took to observe the terminal status
    pub polls: u32,
}

impl CallResult {
    /// Build the result from the terminal snapshot
    pub fn from_terminal(call_id: CallHandle, snapshot: CallSnapshot, polls: u32) -> Self {
        let transcript = snapshot
            .transcript
            .as_deref()
            .map(parse_transcript)
            .filter(|utterances| !utterances.is_empty());

        Self {
            call_id,
            status: snapshot.status,
            transcript,
            summary: snapshot.summary.filter(|s| !s.trim().is_empty()),
            ended_reason: snapshot.ended_reason,
            started_at: snapshot.started_at,
            ended_at: snapshot.ended_at,
            polls,
        }
    }
}

/// Split a provider transcript into utterances
///
/// The provider emits one `Role: text` line per turn. Lines without a
/// recognised role continue the previous utterance.
pub fn parse_transcript(raw: &str) -> Vec<Utterance> {
    let mut utterances: Vec<Utterance> = Vec::new();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((speaker, text)) = split_role(line) {
            utterances.push(Utterance {
                speaker,
                text: text.to_string(),
            });
            continue;
        }

        match utterances.last_mut() {
            Some(last) => {
                if !last.text.is_empty() {
                    last.text.push(' ');
                }
                last.text.push_str(line);
            }
            None => utterances.push(Utterance {
                speaker: Speaker::Unknown,
                text: line.to_string(),
            }),
        }
    }

    utterances
}

fn split_role(line: &str) -> Option<(Speaker, &str)> {
    let (role, text) = line.split_once(':')?;
    let speaker = match role.trim().to_ascii_lowercase().as_str() {
        "ai" | "assistant" | "bot" | "agent" => Speaker::Assistant,
        "user" | "customer" | "client" => Speaker::Customer,
        _ => return None,
    };
    Some((speaker, text.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(CallStatus::Ended.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
        assert!(!CallStatus::Queued.is_terminal());
        assert!(!CallStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_decoding() {
        let status: CallStatus = serde_json::from_str(r#""in-progress""#).unwrap();
        assert_eq!(status, CallStatus::InProgress);
        let status: CallStatus = serde_json::from_str(r#""something-new""#).unwrap();
        assert_eq!(status, CallStatus::Unknown);
        assert_eq!(CallStatus::InProgress.to_string(), "in-progress");
    }

    #[test]
    fn test_parse_transcript_roles_and_continuations() {
        let raw = "AI: Hi, this is the scheduling assistant.\nUser: Hello.\nI need a slot next week.\n\nAI: Tuesday works.";
        let utterances = parse_transcript(raw);

        assert_eq!(utterances.len(), 3);
        assert_eq!(utterances[0].speaker, Speaker::Assistant);
        assert_eq!(utterances[1].speaker, Speaker::Customer);
        assert_eq!(utterances[1].text, "Hello. I need a slot next week.");
        assert_eq!(utterances[2].text, "Tuesday works.");
    }

    #[test]
    fn test_parse_transcript_without_roles() {
        let utterances = parse_transcript("ringing... no answer");
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].speaker, Speaker::Unknown);
        assert!(parse_transcript("  \n ").is_empty());
    }

    #[test]
    fn test_variables_accept_both_spellings() {
        let vars: CallVariables = serde_json::from_str(
            r#"{"service_description": "HVAC repair", "timeWindow": "Tue 9-11", "priority": "high"}"#,
        )
        .unwrap();

        assert_eq!(vars.service_description.as_deref(), Some("HVAC repair"));
        assert_eq!(vars.time_window.as_deref(), Some("Tue 9-11"));
        assert_eq!(vars.extra.get("priority"), Some(&serde_json::json!("high")));

        let out = serde_json::to_value(&vars).unwrap();
        assert_eq!(out["serviceDescription"], "HVAC repair");
        assert_eq!(out["priority"], "high");
        assert!(out.get("email").is_none());
    }

    #[test]
    fn test_result_drops_empty_transcript_and_summary() {
        let snapshot = CallSnapshot {
            transcript: Some("\n".to_string()),
            summary: Some("  ".to_string()),
            ..CallSnapshot::with_status(CallStatus::Failed)
        };
        let result = CallResult::from_terminal(CallHandle::new("c1"), snapshot, 1);
        assert!(result.transcript.is_none());
        assert!(result.summary.is_none());
        assert_eq!(result.status, CallStatus::Failed);
    }
}
