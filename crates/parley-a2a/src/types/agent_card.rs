//! Agent Card types for capability discovery in the A2A protocol.

use serde::{Deserialize, Serialize};

use super::PROTOCOL_VERSION;

/// Agent Card for capability discovery
///
/// The Agent Card is a JSON document that describes an agent's capabilities,
/// skills, and where to reach it. The engine treats it as a static
/// descriptor; only the capability flags influence request handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Human-readable name of the agent
    pub name: String,

    /// Description of the agent
    pub description: String,

    /// URL of the JSON-RPC endpoint
    pub url: String,

    /// Version of the agent implementation
    pub version: String,

    /// Protocol revision spoken by the agent
    pub protocol_version: String,

    /// Provider information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,

    /// Agent capabilities
    #[serde(default)]
    pub capabilities: AgentCapabilities,

    /// Input MIME types accepted by default
    #[serde(default)]
    pub default_input_modes: Vec<String>,

    /// Output MIME types produced by default
    #[serde(default)]
    pub default_output_modes: Vec<String>,

    /// Skills the agent can perform
    #[serde(default)]
    pub skills: Vec<AgentSkill>,

    /// Whether an authenticated extended card can be requested
    #[serde(default)]
    pub supports_authenticated_extended_card: bool,
}

impl AgentCard {
    /// Create a new agent card with required fields
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            provider: None,
            capabilities: AgentCapabilities::default(),
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: vec!["text/plain".to_string()],
            skills: Vec::new(),
            supports_authenticated_extended_card: false,
        }
    }

    /// Add a skill to the agent card
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: AgentProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Toggle streaming capability
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = enabled;
        self
    }

    /// Toggle push notifications
    pub fn with_push_notifications(mut self, enabled: bool) -> Self {
        self.capabilities.push_notifications = enabled;
        self
    }

    /// Advertise an authenticated extended card
    pub fn with_extended_card(mut self, supported: bool) -> Self {
        self.supports_authenticated_extended_card = supported;
        self
    }
}

/// Information about the agent provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProvider {
    /// Organization name
    pub organization: String,

    /// Provider URL
    pub url: String,
}

/// Agent capabilities
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Whether the agent supports `message/stream`
    #[serde(default)]
    pub streaming: bool,

    /// Whether the agent accepts push notification configs
    #[serde(default)]
    pub push_notifications: bool,

    /// Whether status history is retained on tasks
    #[serde(default)]
    pub state_transition_history: bool,
}

/// A skill that the agent can perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// Unique identifier for the skill
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Description of what the skill does
    #[serde(default)]
    pub description: String,

    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,

    /// Example prompts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl AgentSkill {
    /// Create a new skill
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            examples: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add an example prompt
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}
