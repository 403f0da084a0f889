//! Entity shapes persisted by [`crate::Store`] — spec.md §3 DATA MODEL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Client,
    Investor,
    Family,
    Colleague,
    Friend,
    Vendor,
    Unknown,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Client => "client",
            Relationship::Investor => "investor",
            Relationship::Family => "family",
            Relationship::Colleague => "colleague",
            Relationship::Friend => "friend",
            Relationship::Vendor => "vendor",
            Relationship::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "client" => Relationship::Client,
            "investor" => Relationship::Investor,
            "family" => Relationship::Family,
            "colleague" => Relationship::Colleague,
            "friend" => Relationship::Friend,
            "vendor" => Relationship::Vendor,
            _ => Relationship::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Snoozed,
    Executed,
    Expired,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Snoozed => "snoozed",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => ProposalStatus::Pending,
            "approved" => ProposalStatus::Approved,
            "rejected" => ProposalStatus::Rejected,
            "snoozed" => ProposalStatus::Snoozed,
            "executed" => ProposalStatus::Executed,
            "expired" => ProposalStatus::Expired,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub source: String,
    pub event_type: String,
    pub title: String,
    pub body: String,
    /// Opaque JSON blob; typed accessors below per spec §9.
    pub metadata: Value,
    pub priority: Option<String>,
    pub processed: bool,
}

impl Event {
    pub fn sender_email(&self) -> Option<&str> {
        self.metadata.get("sender_email").and_then(Value::as_str)
    }
    pub fn urgency(&self) -> Option<&str> {
        self.metadata.get("urgency").and_then(Value::as_str)
    }
    pub fn start_time(&self) -> Option<&str> {
        self.metadata.get("start_time").and_then(Value::as_str)
    }
    pub fn end_time(&self) -> Option<&str> {
        self.metadata.get("end_time").and_then(Value::as_str)
    }
    pub fn duration_minutes(&self) -> Option<i64> {
        self.metadata.get("duration_minutes").and_then(Value::as_i64)
    }
    pub fn attendees(&self) -> Vec<String> {
        self.metadata
            .get("attendees")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
    pub fn is_read(&self) -> bool {
        self.metadata
            .get("is_read")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub name: String,
    pub relationship: Relationship,
    pub organization: Option<String>,
    pub last_interaction: Option<DateTime<Utc>>,
    pub interaction_count: i64,
    pub avg_response_time_hours: f64,
    pub notes: Option<String>,
}

impl Contact {
    /// spec.md §3: `is VIP iff interaction_count >= 10 and
    /// avg_response_time_hours < 4`.
    pub fn is_vip(&self) -> bool {
        self.interaction_count >= 10 && self.avg_response_time_hours < 4.0
    }

    /// Synthetic key for contacts discovered without a real email address.
    pub fn synthetic_email(name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '.' })
            .collect();
        format!("{slug}@contact.local")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub proposal_type: String,
    pub title: String,
    pub description: String,
    pub action_data: Value,
    pub status: ProposalStatus,
    pub priority: u8,
    pub expires_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub pattern_type: String,
    pub description: String,
    pub frequency: i64,
    pub last_seen: DateTime<Utc>,
    pub confidence: f32,
    pub promoted_to_automation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub key: String,
    pub value: Value,
    pub confidence: f32,
    pub learned_from: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefingType {
    Morning,
    Evening,
    Weekly,
}

impl BriefingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BriefingType::Morning => "morning",
            BriefingType::Evening => "evening",
            BriefingType::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub id: i64,
    pub date: chrono::NaiveDate,
    pub briefing_type: String,
    pub content: String,
    pub events_processed: i64,
    pub actions_proposed: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub id: String,
    pub text: String,
    pub source: String,
    pub source_type: String,
    pub ts: DateTime<Utc>,
    pub contacts: Vec<String>,
    pub metadata: Value,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub task_type: String,
    pub state_json: Value,
    pub profile_json: Value,
    pub plan_json: Value,
    pub graph_json: Value,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledSkill {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub category: String,
    pub permissions: Vec<String>,
    pub enabled: bool,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: Value,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "assistant" => ChatRole::Assistant,
            "tool" => ChatRole::Tool,
            _ => ChatRole::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub ts: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallRecord {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub prompt_hash: String,
    pub prompt_preview: String,
    pub prompt_size: i64,
    pub response_size: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cost_estimate: f64,
    pub source: String,
    pub duration_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
}
