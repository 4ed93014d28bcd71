//! Scripted model and in-memory tool providers for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use evana_llm::{GenerationClient, ModelProvider, ModelRequest, ModelTurn, ToolCallRequest};
use evana_shared::{EvanaError, EventRequirements, Result};
use evana_tools::{
    CrawlProvider, EmailProvider, EmailReceipt, PageContent, SearchProvider, ToolAdapter,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn requirements_json(emails: &[&str]) -> String {
    serde_json::json!({
        "eventType": "birthday party",
        "attendeeCount": 20,
        "budget": 2000,
        "location": "Austin",
        "dateTime": "Saturday evening",
        "duration": 4,
        "preferences": {
            "theme": "retro arcade",
            "foodPreferences": "bbq, vegetarian options",
            "mustHaveElements": ["cake", "dj"]
        },
        "additionalNotes": "",
        "stakeholderEmails": emails
    })
    .to_string()
}

pub(crate) fn requirements(emails: &[&str]) -> EventRequirements {
    evana_schema::validate(&requirements_json(emails)).expect("fixture requirements are valid")
}

pub(crate) fn agenda_json() -> String {
    serde_json::json!({
        "agendaItems": [
            { "startTime": "6:00 PM", "endTime": "7:00 PM", "activity": "Arrivals and games",
              "location": "Main room", "notes": "" },
            { "startTime": "7:00 PM", "endTime": "8:00 PM", "activity": "Dinner",
              "location": "Patio", "notes": "BBQ buffet" }
        ]
    })
    .to_string()
}

pub(crate) fn checklist_json(status: &str) -> String {
    serde_json::json!({
        "checklistItems": [
            { "task": "Book venue", "deadline": "4 weeks before", "category": "venue", "status": status },
            { "task": "Order cake", "deadline": "1 week before", "category": "catering", "status": "Not Started" }
        ]
    })
    .to_string()
}

pub(crate) fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Answers requests from a fixed queue and records each request.
pub(crate) struct ScriptedModel {
    state: Arc<ScriptState>,
}

struct ScriptState {
    replies: Mutex<VecDeque<Result<ModelTurn>>>,
    /// Answer used once the queue is empty.
    repeat: Option<ModelTurn>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub(crate) fn new(turns: Vec<ModelTurn>) -> Self {
        Self::from_results(turns.into_iter().map(Ok).collect())
    }

    pub(crate) fn from_results(replies: Vec<Result<ModelTurn>>) -> Self {
        Self {
            state: Arc::new(ScriptState {
                replies: Mutex::new(replies.into()),
                repeat: None,
                requests: Mutex::new(Vec::new()),
                delay: None,
            }),
        }
    }

    /// Give the same answer to every request.
    pub(crate) fn repeating(turn: ModelTurn) -> Self {
        let mut model = Self::from_results(Vec::new());
        Arc::get_mut(&mut model.state)
            .expect("configure before sharing")
            .repeat = Some(turn);
        model
    }

    /// Sleep before each answer.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        Arc::get_mut(&mut self.state)
            .expect("configure before sharing")
            .delay = Some(delay);
        self
    }

    pub(crate) fn client(&self) -> GenerationClient {
        GenerationClient::new(self.state.clone(), "scripted-model")
            .with_backoff(Duration::from_millis(1))
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptState {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelTurn> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(turn)) => Ok(turn.clone()),
            (None, None) => Err(EvanaError::model(None, "script exhausted")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool providers
// ---------------------------------------------------------------------------

/// Deterministic providers that record what they were asked.
#[derive(Default)]
pub(crate) struct ToolRecorder {
    searches: Mutex<Vec<String>>,
    crawls: Mutex<Vec<String>>,
    emails: Mutex<Vec<Vec<String>>>,
}

impl ToolRecorder {
    pub(crate) fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub(crate) fn crawls(&self) -> Vec<String> {
        self.crawls.lock().unwrap().clone()
    }

    pub(crate) fn emails(&self) -> Vec<Vec<String>> {
        self.emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ToolRecorder {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<PageContent>> {
        self.searches.lock().unwrap().push(query.to_string());
        Ok((1..=count.min(2))
            .map(|i| PageContent {
                url: format!("https://vendor{i}.test"),
                content: format!("Vendor {i} for {query}"),
            })
            .collect())
    }
}

#[async_trait]
impl CrawlProvider for ToolRecorder {
    async fn crawl(&self, url: &str, _max_pages: u32) -> Result<Vec<PageContent>> {
        self.crawls.lock().unwrap().push(url.to_string());
        Ok(vec![PageContent {
            url: url.to_string(),
            content: "Capacity 40. Private patio.".into(),
        }])
    }
}

#[async_trait]
impl EmailProvider for ToolRecorder {
    async fn send(&self, to: &[String], _subject: &str, _body: &str) -> Result<EmailReceipt> {
        self.emails.lock().unwrap().push(to.to_vec());
        Ok(EmailReceipt::delivered(to.to_vec()))
    }
}

/// Providers that fail every call.
pub(crate) struct FailingTools;

#[async_trait]
impl SearchProvider for FailingTools {
    async fn search(&self, _query: &str, _count: u32) -> Result<Vec<PageContent>> {
        Err(EvanaError::Network("search backend unreachable".into()))
    }
}

#[async_trait]
impl CrawlProvider for FailingTools {
    async fn crawl(&self, _url: &str, _max_pages: u32) -> Result<Vec<PageContent>> {
        Err(EvanaError::tool("crawl_venue_website", "HTTP 503"))
    }
}

#[async_trait]
impl EmailProvider for FailingTools {
    async fn send(&self, _to: &[String], _subject: &str, _body: &str) -> Result<EmailReceipt> {
        Err(EvanaError::Network("smtp unreachable".into()))
    }
}

/// Search that sleeps per query before answering and records the order
/// in which searches finish.
pub(crate) struct DelayedSearch {
    delays: Vec<(String, Duration)>,
    finished: Mutex<Vec<String>>,
}

impl DelayedSearch {
    pub(crate) fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for DelayedSearch {
    async fn search(&self, query: &str, _count: u32) -> Result<Vec<PageContent>> {
        let delay = self
            .delays
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, d)| *d)
            .unwrap_or_default();
        tokio::time::sleep(delay).await;
        self.finished.lock().unwrap().push(query.to_string());
        Ok(vec![PageContent {
            url: format!("https://{query}.test"),
            content: format!("results for {query}"),
        }])
    }
}

pub(crate) fn delayed_search_tools(delays: &[(&str, Duration)]) -> (ToolAdapter, Arc<DelayedSearch>) {
    let search = Arc::new(DelayedSearch {
        delays: delays.iter().map(|(q, d)| (q.to_string(), *d)).collect(),
        finished: Mutex::new(Vec::new()),
    });
    let recorder = Arc::new(ToolRecorder::default());
    let adapter = ToolAdapter::new(search.clone(), recorder.clone(), recorder);
    (adapter, search)
}

pub(crate) fn recording_tools() -> (ToolAdapter, Arc<ToolRecorder>) {
    let recorder = Arc::new(ToolRecorder::default());
    let adapter = ToolAdapter::new(recorder.clone(), recorder.clone(), recorder.clone());
    (adapter, recorder)
}

pub(crate) fn static_tools() -> ToolAdapter {
    recording_tools().0
}

pub(crate) fn failing_tools() -> ToolAdapter {
    let failing = Arc::new(FailingTools);
    ToolAdapter::new(failing.clone(), failing.clone(), failing)
}
