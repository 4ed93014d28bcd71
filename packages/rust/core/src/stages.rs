//! Per-stage instructions and user messages.

use evana_shared::{EventAgenda, EventRequirements, TimelineChecklist};

/// Characters of the brief quoted in the email request.
const EMAIL_BRIEF_PREVIEW_CHARS: usize = 500;

pub(crate) const REQUIREMENTS_INSTRUCTIONS: &str = "You are Evana, an AI event planning assistant. \
Extract event requirements from the user's input. If the user hasn't provided enough information, \
make reasonable assumptions based on the event type and other details provided. For missing \
information, use industry standards to fill in the gaps. If stakeholder emails aren't provided, \
leave them as an empty array.";

pub(crate) const AGENDA_INSTRUCTIONS: &str = "Based on the event requirements, create a detailed \
agenda for the event. Include appropriate breaks, meal times, and activities based on the event \
type and duration. List agenda items in chronological order and keep the schedule realistic for \
the specific event type.";

pub(crate) const VENDOR_SEARCH_INSTRUCTIONS: &str = "You are an event planning assistant. Use the \
search tool to find relevant vendors for the event.";

pub(crate) const VENDOR_SUMMARY_INSTRUCTIONS: &str = "Summarize the search results into a \
structured list of vendor recommendations.";

pub(crate) const VENUE_CRAWL_INSTRUCTIONS: &str = "You are an event planning assistant. Extract \
venue URLs from the search results and use the crawler tool to gather detailed information.";

pub(crate) const VENUE_SUMMARY_INSTRUCTIONS: &str = "Summarize the venue information into a \
structured format with key details like capacity, amenities, pricing, and availability.";

pub(crate) const CHECKLIST_INSTRUCTIONS: &str = "Based on the event requirements, agenda, and \
vendor information, create a timeline and checklist for planning the event. Include all necessary \
tasks with realistic deadlines working backward from the event date. Categorize tasks \
appropriately and set all initial statuses to \"Not Started\".";

pub(crate) const BRIEF_INSTRUCTIONS: &str = "Create a comprehensive event brief based on all the \
information gathered. The brief should be well-structured, professional, and ready to share with \
stakeholders. Include sections for event overview, agenda, vendor recommendations, venue details, \
and planning timeline. Format the output in Markdown.";

pub(crate) const EMAIL_INSTRUCTIONS: &str = "You are an event planning assistant. Create an email \
with the event brief and send it to the stakeholders.";

pub(crate) const EMAIL_SUMMARY_INSTRUCTIONS: &str = "Confirm that the email has been sent and \
provide a summary of what was sent.";

/// Placeholder for a vendor search stage that could not run.
pub(crate) fn vendor_search_unavailable(reason: &str) -> String {
    format!("Vendor search unavailable: {reason}")
}

/// Placeholder for a venue crawl stage that could not run.
pub(crate) fn venue_details_unavailable(reason: &str) -> String {
    format!("Venue details unavailable: {reason}")
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub(crate) fn agenda_prompt(req: &EventRequirements) -> String {
    format!(
        "Create an agenda for my event with these requirements: {}",
        to_json(req)
    )
}

pub(crate) fn vendor_search_prompt(req: &EventRequirements) -> String {
    format!(
        "Find top vendors for {} events in {} with a budget of ${} for {} people. \
         I need catering, venue, and entertainment options.",
        req.event_type, req.location, req.budget, req.attendee_count
    )
}

pub(crate) fn venue_crawl_prompt(vendor_results: &str) -> String {
    format!(
        "Extract venue URLs from these vendor search results and crawl them to get detailed \
         information:\n{vendor_results}"
    )
}

pub(crate) fn checklist_prompt(
    req: &EventRequirements,
    agenda: &EventAgenda,
    vendor_results: &str,
    venue_details: &str,
) -> String {
    format!(
        "Create a planning timeline and checklist for my {} on {}.\n\
         Here's my agenda: {}\n\
         Vendor information: {vendor_results}\n\
         Venue details: {venue_details}",
        req.event_type,
        req.date_time,
        to_json(agenda)
    )
}

pub(crate) fn brief_prompt(
    req: &EventRequirements,
    agenda: &EventAgenda,
    vendor_results: &str,
    venue_details: &str,
    checklist: &TimelineChecklist,
) -> String {
    format!(
        "Create an event brief for my {} with the following details:\n\n\
         Event Requirements: {}\n\
         Event Agenda: {}\n\
         Vendor Information: {vendor_results}\n\
         Venue Details: {venue_details}\n\
         Planning Timeline: {}",
        req.event_type,
        to_json(req),
        to_json(agenda),
        to_json(checklist)
    )
}

pub(crate) fn email_prompt(recipients: &[String], brief: &str) -> String {
    let preview: String = brief.chars().take(EMAIL_BRIEF_PREVIEW_CHARS).collect();
    format!(
        "Send the event brief to the following stakeholders: {}.\n\
         The event brief is: {preview}...",
        recipients.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::requirements;

    #[test]
    fn vendor_prompt_names_key_requirements() {
        let prompt = vendor_search_prompt(&requirements(&[]));
        assert!(prompt.contains("birthday party"));
        assert!(prompt.contains("Austin"));
        assert!(prompt.contains("$2000"));
        assert!(prompt.contains("20 people"));
    }

    #[test]
    fn email_prompt_quotes_brief_preview() {
        let brief = "x".repeat(800);
        let prompt = email_prompt(&["a@x.io".into(), "b@x.io".into()], &brief);
        assert!(prompt.contains("a@x.io, b@x.io"));
        assert!(prompt.ends_with(&format!("{}...", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
    }

    #[test]
    fn brief_prompt_embeds_every_artifact() {
        let req = requirements(&[]);
        let agenda = EventAgenda {
            agenda_items: Vec::new(),
        };
        let checklist = TimelineChecklist {
            checklist_items: Vec::new(),
        };
        let prompt = brief_prompt(&req, &agenda, "VENDORS", "VENUES", &checklist);
        assert!(prompt.contains(r#""attendeeCount":20"#));
        assert!(prompt.contains(r#"{"agendaItems":[]}"#));
        assert!(prompt.contains("VENDORS"));
        assert!(prompt.contains("VENUES"));
        assert!(prompt.contains(r#"{"checklistItems":[]}"#));
    }
}
