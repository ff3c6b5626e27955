//! Email drafting
//!
//! Drafts a deal follow-up email with the text-generation provider. Without
//! a configured API key a fixed template is used instead, and the response
//! says so.

use crate::error::AppError;
use crate::llm::api_client::GeminiClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Kind of email being drafted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailKind {
    /// Ask for an appointment
    Schedule,
    /// Follow up on an earlier conversation
    Followup,
    /// Anything else
    #[default]
    Custom,
}

impl EmailKind {
    fn as_str(self) -> &'static str {
        match self {
            EmailKind::Schedule => "schedule",
            EmailKind::Followup => "followup",
            EmailKind::Custom => "custom",
        }
    }

    fn template_subject(self) -> &'static str {
        match self {
            EmailKind::Schedule => "Scheduling an appointment",
            EmailKind::Followup => "Following up on our conversation",
            EmailKind::Custom => "Regarding your inquiry",
        }
    }
}

/// Email draft request
///
/// Field names are camelCase on the wire; snake_case is accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    /// Deal the email is about
    #[serde(default, alias = "deal_id")]
    pub deal_id: Option<String>,
    /// Kind of email
    #[serde(default)]
    pub subtype: EmailKind,
    /// Subject to use verbatim instead of a generated one
    #[serde(default)]
    pub subject: Option<String>,
    /// Body to use verbatim instead of a generated one
    #[serde(default)]
    pub body: Option<String>,
    /// Free-form notes for the model
    #[serde(default)]
    pub notes: Option<String>,
    /// Client's name
    #[serde(default, alias = "client_name")]
    pub client_name: Option<String>,
    /// Client's company
    #[serde(default)]
    pub company: Option<String>,
    /// Deal title
    #[serde(default, alias = "deal_title")]
    pub deal_title: Option<String>,
    /// Date of the last contact
    #[serde(default, alias = "last_contact")]
    pub last_contact: Option<String>,
}

/// Where a draft came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftSource {
    /// Written by the model
    Generated,
    /// Fixed template
    Template,
}

/// A drafted email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftedEmail {
    /// Subject line
    pub subject: String,
    /// Body text
    pub body: String,
    /// Where the draft came from
    pub source: DraftSource,
}

/// Shape the model must answer with
#[derive(Debug, Deserialize)]
struct GeneratedEmail {
    subject: String,
    contents: String,
}

/// JSON schema for [`GeneratedEmail`] in Gemini's schema dialect
fn email_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "required": ["subject", "contents"],
        "properties": {
            "subject": { "type": "STRING" },
            "contents": { "type": "STRING" }
        }
    })
}

/// Drafts emails, with or without a model behind it
#[derive(Clone)]
pub struct EmailDrafter {
    client: GeminiClient,
    sender: String,
}

impl EmailDrafter {
    /// Create a drafter; `sender` is how the email introduces its author
    pub fn new(client: GeminiClient, sender: impl Into<String>) -> Self {
        Self {
            client,
            sender: sender.into(),
        }
    }

    /// Draft an email for a deal
    ///
    /// Caller-supplied subject and body always win over generated ones.
    ///
    /// # Errors
    /// * `AppError::Provider` if the model call fails
    /// * `AppError::MalformedResponse` if the model's answer doesn't match
    ///   the `{subject, contents}` schema
    pub async fn draft(&self, request: DraftRequest) -> Result<DraftedEmail, AppError> {
        if !self.client.is_configured() {
            tracing::info!(subtype = request.subtype.as_str(), "No Gemini key; using template draft");
            return Ok(template_draft(request));
        }

        let prompt = self.build_prompt(&request);
        let generated: GeneratedEmail = self
            .client
            .generate_structured(&prompt, email_schema())
            .await?
            .into_result()?;

        tracing::info!(
            deal_id = ?request.deal_id,
            subtype = request.subtype.as_str(),
            "Drafted email with Gemini"
        );

        Ok(DraftedEmail {
            subject: non_blank(request.subject).unwrap_or(generated.subject),
            body: non_blank(request.body).unwrap_or(generated.contents),
            source: DraftSource::Generated,
        })
    }

    fn build_prompt(&self, request: &DraftRequest) -> String {
        let subtype = request.subtype.as_str();
        let context = context_lines(request).join("\n");
        let notes = request
            .notes
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("No additional notes provided.");

        format!(
            "You are {sender}. Compose a concise, professional {subtype} email. \
             Use the context below and the notes. Return JSON {{\"subject\", \"contents\"}} only.\n\n\
             Context:\n{context}\n\nNotes:\n{notes}",
            sender = self.sender,
        )
    }
}

fn context_lines(request: &DraftRequest) -> Vec<String> {
    let labelled = [
        ("Client name", &request.client_name),
        ("Company", &request.company),
        ("Deal title", &request.deal_title),
        ("Last contact date", &request.last_contact),
    ];

    let mut lines: Vec<String> = labelled
        .iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{}: {}", label, v))
        })
        .collect();
    lines.push(format!("Subtype: {}", request.subtype.as_str()));
    lines.push(format!(
        "Deal ID: {}",
        request.deal_id.as_deref().unwrap_or("n/a")
    ));
    lines
}

fn template_draft(request: DraftRequest) -> DraftedEmail {
    let subtype = request.subtype;
    DraftedEmail {
        subject: non_blank(request.subject)
            .unwrap_or_else(|| subtype.template_subject().to_string()),
        body: non_blank(request.body).unwrap_or_else(|| {
            format!(
                "Hi there,\n\nI wanted to reach out about next steps for our {} request. \
                 Let me know a good time to connect.\n\nBest regards,\nYour Name",
                subtype.as_str()
            )
        }),
        source: DraftSource::Template,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
