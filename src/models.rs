//! REST models for the monster list and generation endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Accept ids sent either as JSON strings or numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// One row of the monster collection. Unknown fields are kept in `extra`
/// so detail views can show them without a model change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub monster_id: String,
    pub prompt_type: String,
}

impl GenerationRequest {
    pub fn new(monster_id: impl Into<String>, prompt_type: impl Into<String>) -> Self {
        Self {
            monster_id: monster_id.into(),
            prompt_type: prompt_type.into(),
        }
    }
}

/// Synchronous answer to a generation request. The work itself is reported
/// later on the event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationTicket {
    #[serde(default, alias = "generationId", deserialize_with = "lenient_id")]
    pub generation_id: Option<String>,
    #[serde(default, alias = "logId", deserialize_with = "lenient_id")]
    pub log_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GenerationTicket {
    /// Id to correlate with stream events: the generation id, else the log id.
    pub fn correlation_id(&self) -> Option<&str> {
        self.generation_id.as_deref().or(self.log_id.as_deref())
    }
}
