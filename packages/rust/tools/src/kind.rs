//! The closed set of tools the model may call.

use serde::Deserialize;
use serde_json::json;

use evana_llm::ToolDefinition;
use evana_shared::{EvanaError, Result};

/// A tool known to the adapter. Wire names are resolved once, here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SearchVendors,
    CrawlVenueWebsite,
    SendEmail,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::SearchVendors,
        ToolKind::CrawlVenueWebsite,
        ToolKind::SendEmail,
    ];

    /// Function name as seen by the model.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchVendors => "search_vendors",
            Self::CrawlVenueWebsite => "crawl_venue_website",
            Self::SendEmail => "send_email",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Declaration sent to the model in conversational mode.
    pub fn definition(&self) -> ToolDefinition {
        let (description, parameters) = match self {
            Self::SearchVendors => (
                "Search the web for event vendors such as caterers, venues and entertainment.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query describing the vendors to find"
                        },
                        "totalResults": {
                            "type": ["number", "null"],
                            "description": "Number of results to return (default 5)"
                        }
                    },
                    "required": ["query", "totalResults"],
                    "additionalProperties": false
                }),
            ),
            Self::CrawlVenueWebsite => (
                "Crawl a venue or vendor website and return its page content.",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Website URL to crawl"
                        },
                        "maxPages": {
                            "type": ["number", "null"],
                            "description": "Maximum number of pages to crawl (default 3)"
                        }
                    },
                    "required": ["url", "maxPages"],
                    "additionalProperties": false
                }),
            ),
            Self::SendEmail => (
                "Send an email to one or more recipients.",
                json!({
                    "type": "object",
                    "properties": {
                        "to": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Recipient email addresses"
                        },
                        "subject": {
                            "type": "string",
                            "description": "Email subject line"
                        },
                        "body": {
                            "type": "string",
                            "description": "Email body"
                        }
                    },
                    "required": ["to", "subject", "body"],
                    "additionalProperties": false
                }),
            ),
        };

        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
            strict: true,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Definitions for a toolset, in the given order.
pub fn definitions(kinds: &[ToolKind]) -> Vec<ToolDefinition> {
    kinds.iter().map(ToolKind::definition).collect()
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub total_results: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlArgs {
    pub url: String,
    #[serde(default)]
    pub max_pages: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailArgs {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Parse a model-produced argument string for `kind`.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(kind: ToolKind, raw: &str) -> Result<T> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw)
        .map_err(|e| EvanaError::tool(kind.name(), format!("invalid arguments: {e}")))
}

/// Clamp a numeric model argument to `1..=max`, falling back to `default`.
pub(crate) fn count_arg(value: Option<f64>, default: u32, max: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() && v >= 1.0 => (v as u32).min(max),
        _ => default.clamp(1, max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("delete_everything"), None);
    }

    #[test]
    fn definitions_declare_required_arguments() {
        let defs = definitions(&[ToolKind::SearchVendors, ToolKind::SendEmail]);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "search_vendors");
        assert_eq!(defs[0].parameters["required"], json!(["query", "totalResults"]));
        assert_eq!(defs[1].parameters["required"], json!(["to", "subject", "body"]));
    }

    #[test]
    fn definitions_are_strict_and_closed() {
        for def in definitions(&ToolKind::ALL) {
            assert!(def.strict, "{} is not strict", def.name);
            assert_eq!(def.parameters["additionalProperties"], json!(false));

            // Strict mode needs every declared property listed as required.
            let properties = def.parameters["properties"].as_object().unwrap();
            let required = def.parameters["required"].as_array().unwrap();
            assert_eq!(properties.len(), required.len(), "{}", def.name);
        }
    }

    #[test]
    fn optional_counts_accept_null() {
        let args: SearchArgs = parse_args(
            ToolKind::SearchVendors,
            r#"{"query":"bbq austin","totalResults":null}"#,
        )
        .unwrap();
        assert_eq!(args.total_results, None);

        let args: CrawlArgs =
            parse_args(ToolKind::CrawlVenueWebsite, r#"{"url":"https://venue.test","maxPages":null}"#)
                .unwrap();
        assert_eq!(args.max_pages, None);
    }

    #[test]
    fn parses_camel_case_arguments() {
        let args: SearchArgs =
            parse_args(ToolKind::SearchVendors, r#"{"query":"bbq austin","totalResults":3}"#)
                .unwrap();
        assert_eq!(args.query, "bbq austin");
        assert_eq!(args.total_results, Some(3.0));

        let args: CrawlArgs =
            parse_args(ToolKind::CrawlVenueWebsite, r#"{"url":"https://venue.test"}"#).unwrap();
        assert_eq!(args.max_pages, None);
    }

    #[test]
    fn bad_arguments_name_the_tool() {
        let err = parse_args::<EmailArgs>(ToolKind::SendEmail, "{\"to\": 5}").unwrap_err();
        assert!(err.to_string().contains("send_email"));

        let err = parse_args::<SearchArgs>(ToolKind::SearchVendors, "").unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn counts_are_clamped() {
        assert_eq!(count_arg(None, 5, 10), 5);
        assert_eq!(count_arg(Some(3.0), 5, 10), 3);
        assert_eq!(count_arg(Some(0.0), 5, 10), 5);
        assert_eq!(count_arg(Some(50.0), 5, 10), 10);
        assert_eq!(count_arg(Some(f64::NAN), 5, 10), 5);
    }
}
