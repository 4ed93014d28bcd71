//! Schema registry and validator for structured model output.
//!
//! Each structured shape ([`EventRequirements`], [`EventAgenda`],
//! [`TimelineChecklist`]) has a strict JSON Schema that is sent to the model
//! as the response format, and a validator that parses the model's raw text
//! back into the typed value. The model contract should already guarantee
//! conformance; the validator is the safety net.

mod descriptors;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use evana_shared::{
    EvanaError, EventAgenda, EventRequirements, Result, TimelineChecklist,
};

/// Matches a whole response wrapped in a Markdown code fence.
static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?\s*```$").expect("valid code fence regex")
});

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// A named JSON Schema, in the strict `json_schema` response-format flavour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// A type the model can be asked to produce as schema-constrained JSON.
pub trait StructuredOutput: DeserializeOwned + Serialize {
    /// Schema name sent with the response format.
    const SCHEMA_NAME: &'static str;

    /// Strict JSON Schema for this shape.
    fn json_schema() -> serde_json::Value;

    /// Semantic checks serde cannot express.
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Canonicalize a value that passed [`StructuredOutput::check`].
    fn normalize(&mut self) {}

    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor {
            name: Self::SCHEMA_NAME,
            schema: Self::json_schema(),
        }
    }
}

impl StructuredOutput for EventRequirements {
    const SCHEMA_NAME: &'static str = "EventRequirements";

    fn json_schema() -> serde_json::Value {
        descriptors::event_requirements()
    }

    fn check(&self) -> Result<()> {
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(EvanaError::malformed(
                Self::SCHEMA_NAME,
                format!("budget must be a non-negative number, got {}", self.budget),
            ));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(EvanaError::malformed(
                Self::SCHEMA_NAME,
                format!("duration must be a positive number of hours, got {}", self.duration),
            ));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.normalize_emails();
    }
}

impl StructuredOutput for EventAgenda {
    const SCHEMA_NAME: &'static str = "EventAgenda";

    fn json_schema() -> serde_json::Value {
        descriptors::event_agenda()
    }
}

impl StructuredOutput for TimelineChecklist {
    const SCHEMA_NAME: &'static str = "TimelineChecklist";

    fn json_schema() -> serde_json::Value {
        descriptors::timeline_checklist()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The closed set of registered structured shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    EventRequirements,
    EventAgenda,
    TimelineChecklist,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 3] = [
        SchemaKind::EventRequirements,
        SchemaKind::EventAgenda,
        SchemaKind::TimelineChecklist,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EventRequirements => EventRequirements::SCHEMA_NAME,
            Self::EventAgenda => EventAgenda::SCHEMA_NAME,
            Self::TimelineChecklist => TimelineChecklist::SCHEMA_NAME,
        }
    }

    /// Look up a shape by schema name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    pub fn descriptor(&self) -> SchemaDescriptor {
        match self {
            Self::EventRequirements => EventRequirements::descriptor(),
            Self::EventAgenda => EventAgenda::descriptor(),
            Self::TimelineChecklist => TimelineChecklist::descriptor(),
        }
    }

    /// Validate raw output against this shape and return the canonical JSON.
    pub fn validate_value(&self, raw: &str) -> Result<serde_json::Value> {
        fn canonical<T: StructuredOutput>(raw: &str) -> Result<serde_json::Value> {
            let value = validate::<T>(raw)?;
            serde_json::to_value(&value)
                .map_err(|e| EvanaError::malformed(T::SCHEMA_NAME, e.to_string()))
        }

        match self {
            Self::EventRequirements => canonical::<EventRequirements>(raw),
            Self::EventAgenda => canonical::<EventAgenda>(raw),
            Self::TimelineChecklist => canonical::<TimelineChecklist>(raw),
        }
    }
}

/// Every registered descriptor, in pipeline order.
pub fn registry() -> Vec<SchemaDescriptor> {
    SchemaKind::ALL.iter().map(SchemaKind::descriptor).collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Parse and validate raw model output as `T`.
///
/// Fails with [`EvanaError::MalformedOutput`] when the text is not a JSON
/// object, a required field is absent or mistyped, or a semantic check fails.
pub fn validate<T: StructuredOutput>(raw: &str) -> Result<T> {
    let text = strip_code_fence(raw);

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| EvanaError::malformed(T::SCHEMA_NAME, format!("invalid JSON: {e}")))?;

    if !value.is_object() {
        return Err(EvanaError::malformed(
            T::SCHEMA_NAME,
            "expected a JSON object at the top level",
        ));
    }

    let mut parsed: T = serde_json::from_value(value)
        .map_err(|e| EvanaError::malformed(T::SCHEMA_NAME, e.to_string()))?;

    parsed.check()?;
    parsed.normalize();

    debug!(schema = T::SCHEMA_NAME, "structured output validated");
    Ok(parsed)
}

/// Remove a surrounding Markdown code fence, if the whole text is one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match CODE_FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}
