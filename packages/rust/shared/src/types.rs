//! Core domain types for Evana event plans.
//!
//! Field names serialize in camelCase because the same shapes travel to the
//! model as JSON Schema and back to callers inside [`AggregateResult`].

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Fixed email-stage outcome when Stage 1 produced no stakeholder emails.
pub const EMAIL_NOT_SENT_MESSAGE: &str =
    "No stakeholder emails provided. Event brief was not sent via email.";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
///
/// Only used for tracing; never part of the aggregate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The seven ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    GatherEventRequirements,
    GenerateEventAgenda,
    SearchVendors,
    CrawlVenues,
    CreateTimelineChecklist,
    GenerateEventBrief,
    SendEmail,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::GatherEventRequirements,
        Stage::GenerateEventAgenda,
        Stage::SearchVendors,
        Stage::CrawlVenues,
        Stage::CreateTimelineChecklist,
        Stage::GenerateEventBrief,
        Stage::SendEmail,
    ];

    /// Stable stage identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatherEventRequirements => "gather_event_requirements",
            Self::GenerateEventAgenda => "generate_event_agenda",
            Self::SearchVendors => "search_vendors",
            Self::CrawlVenues => "crawl_venues",
            Self::CreateTimelineChecklist => "create_timeline_checklist",
            Self::GenerateEventBrief => "generate_event_brief",
            Self::SendEmail => "send_email",
        }
    }

    /// 1-based position in the pipeline.
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) + 1
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventRequirements
// ---------------------------------------------------------------------------

/// Structured requirements extracted from the user's request (Stage 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequirements {
    /// Type of event (wedding, corporate meeting, birthday party, ...).
    pub event_type: String,
    /// Estimated number of attendees.
    pub attendee_count: u32,
    /// Total budget, currency-agnostic.
    pub budget: f64,
    /// City or region.
    pub location: String,
    /// Free-form schedule description.
    pub date_time: String,
    /// Expected duration in hours.
    pub duration: f64,
    pub preferences: EventPreferences,
    /// Any additional information or special requests (may be empty).
    pub additional_notes: String,
    /// Recipients of the event brief. May be absent in model output.
    #[serde(default)]
    pub stakeholder_emails: Vec<String>,
}

/// Theme, food and must-have preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPreferences {
    pub theme: String,
    pub food_preferences: String,
    pub must_have_elements: Vec<String>,
}

impl EventRequirements {
    /// Trim stakeholder emails, drop blanks, and remove duplicates keeping the
    /// first occurrence.
    pub fn normalize_emails(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let emails = std::mem::take(&mut self.stakeholder_emails);
        self.stakeholder_emails = emails
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty() && seen.insert(e.to_ascii_lowercase()))
            .collect();
    }

    /// Whether the email stage has anyone to send to.
    pub fn has_stakeholders(&self) -> bool {
        !self.stakeholder_emails.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EventAgenda
// ---------------------------------------------------------------------------

/// Ordered agenda for the event (Stage 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAgenda {
    pub agenda_items: Vec<AgendaItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub start_time: String,
    pub end_time: String,
    pub activity: String,
    pub location: String,
    pub notes: String,
}

impl EventAgenda {
    /// Whether start times are non-decreasing.
    ///
    /// Returns `None` when any start time is not a recognizable clock time,
    /// since free-form schedules cannot be compared.
    pub fn is_chronological(&self) -> Option<bool> {
        let minutes: Option<Vec<u32>> = self
            .agenda_items
            .iter()
            .map(|item| parse_clock_minutes(&item.start_time))
            .collect();
        minutes.map(|m| m.windows(2).all(|w| w[0] <= w[1]))
    }
}

/// Parse `HH:MM`, `H:MM AM`, or `H:MM PM` into minutes after midnight.
fn parse_clock_minutes(raw: &str) -> Option<u32> {
    let s = raw.trim().to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = s.strip_suffix("AM") {
        (rest.trim(), Some(false))
    } else if let Some(rest) = s.strip_suffix("PM") {
        (rest.trim(), Some(true))
    } else {
        (s.as_str(), None)
    };

    let (h, m) = clock.split_once(':')?;
    let mut hours: u32 = h.trim().parse().ok()?;
    let minutes: u32 = m.trim().get(..2)?.parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    match meridiem {
        Some(pm) => {
            if hours == 0 || hours > 12 {
                return None;
            }
            hours %= 12;
            if pm {
                hours += 12;
            }
        }
        None if hours > 23 => return None,
        None => {}
    }

    Some(hours * 60 + minutes)
}

// ---------------------------------------------------------------------------
// TimelineChecklist
// ---------------------------------------------------------------------------

/// Planning timeline and checklist (Stage 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineChecklist {
    pub checklist_items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub task: String,
    pub deadline: String,
    /// Task category (venue, catering, logistics, ...).
    pub category: String,
    pub status: ChecklistStatus,
}

/// Checklist task status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecklistStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl ChecklistStatus {
    /// Wire literals accepted for the status field.
    pub const LITERALS: [&'static str; 3] = ["Not Started", "In Progress", "Completed"];
}

impl TimelineChecklist {
    /// Reset every item to `Not Started`. Returns how many items changed.
    pub fn reset_statuses(&mut self) -> usize {
        let mut changed = 0;
        for item in &mut self.checklist_items {
            if item.status != ChecklistStatus::NotStarted {
                item.status = ChecklistStatus::NotStarted;
                changed += 1;
            }
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// EmailOutcome
// ---------------------------------------------------------------------------

/// Result of the conditional email stage.
///
/// Serializes as its user-facing message string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailOutcome {
    /// No stakeholder emails; nothing was attempted.
    NotSent,
    /// The brief was sent; `summary` is the model's confirmation.
    Sent {
        summary: String,
        recipients: Vec<String>,
    },
    /// Sending was attempted and failed.
    Failed { reason: String },
}

impl EmailOutcome {
    /// Build a `Sent` outcome, appending a recipients line when the summary
    /// does not already mention every recipient.
    pub fn sent(summary: impl Into<String>, recipients: Vec<String>) -> Self {
        let mut summary = summary.into();
        let missing = recipients.iter().any(|r| !summary.contains(r.as_str()));
        if missing && !recipients.is_empty() {
            if !summary.is_empty() && !summary.ends_with('\n') {
                summary.push('\n');
            }
            summary.push_str(&format!("Recipients: {}", recipients.join(", ")));
        }
        Self::Sent {
            summary,
            recipients,
        }
    }

    /// The user-facing message.
    pub fn message(&self) -> String {
        match self {
            Self::NotSent => EMAIL_NOT_SENT_MESSAGE.to_string(),
            Self::Sent { summary, .. } => summary.clone(),
            Self::Failed { reason } => {
                format!("Failed to send event brief via email: {reason}")
            }
        }
    }
}

impl Serialize for EmailOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message())
    }
}

// ---------------------------------------------------------------------------
// AggregateResult
// ---------------------------------------------------------------------------

/// Everything a pipeline run produced. Every field is always present;
/// degraded stages carry placeholder text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub event_requirements: EventRequirements,
    pub event_agenda: EventAgenda,
    pub vendor_search_results: String,
    pub venue_details: String,
    pub timeline_checklist: TimelineChecklist,
    pub event_brief: String,
    pub email_result: EmailOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements_json() -> &'static str {
        r#"{
            "eventType": "birthday party",
            "attendeeCount": 20,
            "budget": 2000,
            "location": "Austin",
            "dateTime": "Saturday 7pm",
            "duration": 4,
            "preferences": {
                "theme": "retro",
                "foodPreferences": "bbq",
                "mustHaveElements": ["dj"]
            },
            "additionalNotes": ""
        }"#
    }

    #[test]
    fn requirements_tolerate_missing_emails() {
        let req: EventRequirements = serde_json::from_str(requirements_json()).unwrap();
        assert_eq!(req.attendee_count, 20);
        assert_eq!(req.budget, 2000.0);
        assert!(req.stakeholder_emails.is_empty());
        assert!(!req.has_stakeholders());
    }

    #[test]
    fn requirements_serialize_camel_case() {
        let req: EventRequirements = serde_json::from_str(requirements_json()).unwrap();
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""attendeeCount":20"#));
        assert!(json.contains(r#""mustHaveElements":["dj"]"#));
        assert!(json.contains(r#""stakeholderEmails":[]"#));
    }

    #[test]
    fn normalize_emails_dedupes_and_trims() {
        let mut req: EventRequirements = serde_json::from_str(requirements_json()).unwrap();
        req.stakeholder_emails = vec![
            " ana@example.com ".into(),
            "".into(),
            "bo@example.com".into(),
            "ANA@example.com".into(),
        ];
        req.normalize_emails();
        assert_eq!(req.stakeholder_emails, vec!["ana@example.com", "bo@example.com"]);
    }

    #[test]
    fn stage_names_and_order() {
        assert_eq!(Stage::GatherEventRequirements.to_string(), "gather_event_requirements");
        assert_eq!(Stage::SendEmail.as_str(), "send_email");
        assert_eq!(Stage::GatherEventRequirements.number(), 1);
        assert_eq!(Stage::SendEmail.number(), 7);
    }

    #[test]
    fn checklist_status_literals() {
        let json = r#"{"task":"Book venue","deadline":"8 weeks before","category":"venue","status":"In Progress"}"#;
        let item: ChecklistItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.status, ChecklistStatus::InProgress);

        let mut list = TimelineChecklist {
            checklist_items: vec![item],
        };
        assert_eq!(list.reset_statuses(), 1);
        let out = serde_json::to_string(&list).unwrap();
        assert!(out.contains(r#""status":"Not Started""#));

        let bad = r#"{"task":"x","deadline":"y","category":"z","status":"Blocked"}"#;
        assert!(serde_json::from_str::<ChecklistItem>(bad).is_err());
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock_minutes("09:30"), Some(570));
        assert_eq!(parse_clock_minutes("7:00 PM"), Some(1140));
        assert_eq!(parse_clock_minutes("12:15 am"), Some(15));
        assert_eq!(parse_clock_minutes("after dinner"), None);
        assert_eq!(parse_clock_minutes("25:00"), None);
    }

    #[test]
    fn agenda_order_is_advisory() {
        let item = |start: &str| AgendaItem {
            start_time: start.into(),
            end_time: String::new(),
            activity: "a".into(),
            location: "l".into(),
            notes: String::new(),
        };
        let ordered = EventAgenda {
            agenda_items: vec![item("6:00 PM"), item("19:30")],
        };
        assert_eq!(ordered.is_chronological(), Some(true));

        let shuffled = EventAgenda {
            agenda_items: vec![item("20:00"), item("18:00")],
        };
        assert_eq!(shuffled.is_chronological(), Some(false));

        let vague = EventAgenda {
            agenda_items: vec![item("evening")],
        };
        assert_eq!(vague.is_chronological(), None);
    }

    #[test]
    fn email_outcome_messages() {
        assert_eq!(EmailOutcome::NotSent.message(), EMAIL_NOT_SENT_MESSAGE);
        assert_eq!(
            serde_json::to_string(&EmailOutcome::NotSent).unwrap(),
            format!("\"{EMAIL_NOT_SENT_MESSAGE}\"")
        );

        let sent = EmailOutcome::sent("Sent the brief.", vec!["a@x.io".into(), "b@x.io".into()]);
        assert!(sent.message().contains("a@x.io"));
        assert!(sent.message().contains("b@x.io"));

        let already = EmailOutcome::sent("Sent to a@x.io", vec!["a@x.io".into()]);
        assert_eq!(already.message(), "Sent to a@x.io");

        let failed = EmailOutcome::Failed {
            reason: "smtp down".into(),
        };
        assert!(failed.message().contains("smtp down"));
    }
}
