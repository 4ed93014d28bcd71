//! Strict JSON Schemas for the structured shapes.
//!
//! Strict mode requires every property to be listed in `required` and
//! `additionalProperties: false` on every object.

use serde_json::{Value, json};

use evana_shared::ChecklistStatus;

pub(crate) fn event_requirements() -> Value {
    json!({
        "type": "object",
        "properties": {
            "eventType": {
                "type": "string",
                "description": "Type of event (e.g., wedding, corporate meeting, birthday party)"
            },
            "attendeeCount": {
                "type": "integer",
                "description": "Estimated number of attendees"
            },
            "budget": {
                "type": "number",
                "description": "Total budget"
            },
            "location": {
                "type": "string",
                "description": "City or region where the event will take place"
            },
            "dateTime": {
                "type": "string",
                "description": "Planned date and time for the event"
            },
            "duration": {
                "type": "number",
                "description": "Expected duration in hours"
            },
            "preferences": {
                "type": "object",
                "properties": {
                    "theme": {
                        "type": "string",
                        "description": "Theme or style preference"
                    },
                    "foodPreferences": {
                        "type": "string",
                        "description": "Food preferences or dietary restrictions"
                    },
                    "mustHaveElements": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Elements that must be included in the event"
                    }
                },
                "required": ["theme", "foodPreferences", "mustHaveElements"],
                "additionalProperties": false
            },
            "additionalNotes": {
                "type": "string",
                "description": "Any additional information or special requests"
            },
            "stakeholderEmails": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Email addresses of stakeholders to receive the event brief"
            }
        },
        "required": [
            "eventType",
            "attendeeCount",
            "budget",
            "location",
            "dateTime",
            "duration",
            "preferences",
            "additionalNotes",
            "stakeholderEmails"
        ],
        "additionalProperties": false
    })
}

pub(crate) fn event_agenda() -> Value {
    json!({
        "type": "object",
        "properties": {
            "agendaItems": {
                "type": "array",
                "description": "List of agenda items for the event, in time order",
                "items": {
                    "type": "object",
                    "properties": {
                        "startTime": { "type": "string", "description": "Start time of the agenda item" },
                        "endTime": { "type": "string", "description": "End time of the agenda item" },
                        "activity": { "type": "string", "description": "Description of the activity" },
                        "location": { "type": "string", "description": "Where the activity takes place" },
                        "notes": { "type": "string", "description": "Additional notes about the activity" }
                    },
                    "required": ["startTime", "endTime", "activity", "location", "notes"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["agendaItems"],
        "additionalProperties": false
    })
}

pub(crate) fn timeline_checklist() -> Value {
    json!({
        "type": "object",
        "properties": {
            "checklistItems": {
                "type": "array",
                "description": "List of tasks to be completed for the event",
                "items": {
                    "type": "object",
                    "properties": {
                        "task": { "type": "string", "description": "Task to be completed" },
                        "deadline": { "type": "string", "description": "Deadline for completing the task" },
                        "category": {
                            "type": "string",
                            "description": "Category of the task (e.g., venue, catering, logistics)"
                        },
                        "status": {
                            "type": "string",
                            "enum": ChecklistStatus::LITERALS,
                            "description": "Status of the task"
                        }
                    },
                    "required": ["task", "deadline", "category", "status"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["checklistItems"],
        "additionalProperties": false
    })
}
