//! End-to-end planning pipeline: request → requirements → agenda → vendors →
//! venues → checklist → brief → email.
//!
//! Stages run strictly in order and each stage's output feeds every later
//! stage. Requirements, agenda, checklist and brief are hard dependencies: a
//! failure there aborts the run with [`EvanaError::PipelineAbort`] naming the
//! stage. Vendor search and venue crawling degrade to placeholder text, and
//! the email stage always yields an [`EmailOutcome`].

use std::future::Future;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use evana_llm::{GenerationClient, Message};
use evana_shared::{
    AggregateResult, EmailOutcome, EvanaError, EventAgenda, EventRequirements, PipelineLimits,
    Result, RunContext, RunId, Stage, TimelineChecklist,
};
use evana_tools::{EmailReceipt, ToolAdapter, ToolKind};

use crate::stages;
use crate::tool_loop::{LoopTranscript, ToolLoop};

const VENDOR_TOOLS: &[ToolKind] = &[ToolKind::SearchVendors];
const VENUE_TOOLS: &[ToolKind] = &[ToolKind::CrawlVenueWebsite];
const EMAIL_TOOLS: &[ToolKind] = &[ToolKind::SendEmail];

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: Stage);
    /// Called when a stage ends; `degraded` marks placeholder output.
    fn stage_finished(&self, stage: Stage, degraded: bool);
    /// Called when the run completes successfully.
    fn done(&self, result: &AggregateResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _degraded: bool) {}
    fn done(&self, _result: &AggregateResult) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A configured pipeline. Holds no per-run state, so one instance can serve
/// any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: GenerationClient,
    tools: ToolAdapter,
    limits: PipelineLimits,
}

impl Pipeline {
    pub fn new(client: GenerationClient, tools: ToolAdapter, limits: PipelineLimits) -> Self {
        Self {
            client,
            tools,
            limits,
        }
    }

    /// Wire the HTTP model provider and tool providers from a run context.
    pub fn from_context(ctx: &RunContext) -> Result<Self> {
        Ok(Self::new(
            GenerationClient::from_settings(&ctx.model)?,
            ToolAdapter::from_context(ctx)?,
            ctx.limits,
        ))
    }

    pub fn limits(&self) -> &PipelineLimits {
        &self.limits
    }

    /// Run all seven stages for one user request.
    #[instrument(skip_all, fields(run_id = %RunId::new()))]
    pub async fn run(
        &self,
        input: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<AggregateResult> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EvanaError::validation("event request must not be empty"));
        }

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.limits.run_timeout;
        info!(
            run_timeout_secs = self.limits.run_timeout.as_secs(),
            max_tool_iterations = self.limits.max_tool_iterations,
            "starting planning pipeline"
        );

        // --- Stage 1: requirements ---
        let stage = Stage::GatherEventRequirements;
        progress.stage_started(stage);
        let requirements: EventRequirements = self
            .hard_stage(
                stage,
                deadline,
                self.client.generate_structured(
                    stages::REQUIREMENTS_INSTRUCTIONS,
                    &[Message::user(input)],
                ),
            )
            .await?;
        progress.stage_finished(stage, false);
        info!(
            event_type = %requirements.event_type,
            attendees = requirements.attendee_count,
            stakeholders = requirements.stakeholder_emails.len(),
            "requirements extracted"
        );

        // --- Stage 2: agenda ---
        let stage = Stage::GenerateEventAgenda;
        progress.stage_started(stage);
        let agenda: EventAgenda = self
            .hard_stage(
                stage,
                deadline,
                self.client.generate_structured(
                    stages::AGENDA_INSTRUCTIONS,
                    &[Message::user(stages::agenda_prompt(&requirements))],
                ),
            )
            .await?;
        if agenda.is_chronological() == Some(false) {
            warn!("agenda items are not in chronological order");
        }
        progress.stage_finished(stage, false);

        // --- Stage 3: vendor search ---
        let stage = Stage::SearchVendors;
        progress.stage_started(stage);
        let (vendor_search_results, degraded) = self
            .research_stage(
                stage,
                deadline,
                VENDOR_TOOLS,
                stages::VENDOR_SEARCH_INSTRUCTIONS,
                &stages::vendor_search_prompt(&requirements),
                stages::VENDOR_SUMMARY_INSTRUCTIONS,
                stages::vendor_search_unavailable,
            )
            .await?;
        progress.stage_finished(stage, degraded);

        // --- Stage 4: venue crawl ---
        let stage = Stage::CrawlVenues;
        progress.stage_started(stage);
        let (venue_details, degraded) = self
            .research_stage(
                stage,
                deadline,
                VENUE_TOOLS,
                stages::VENUE_CRAWL_INSTRUCTIONS,
                &stages::venue_crawl_prompt(&vendor_search_results),
                stages::VENUE_SUMMARY_INSTRUCTIONS,
                stages::venue_details_unavailable,
            )
            .await?;
        progress.stage_finished(stage, degraded);

        // --- Stage 5: timeline checklist ---
        let stage = Stage::CreateTimelineChecklist;
        progress.stage_started(stage);
        let mut timeline_checklist: TimelineChecklist = self
            .hard_stage(
                stage,
                deadline,
                self.client.generate_structured(
                    stages::CHECKLIST_INSTRUCTIONS,
                    &[Message::user(stages::checklist_prompt(
                        &requirements,
                        &agenda,
                        &vendor_search_results,
                        &venue_details,
                    ))],
                ),
            )
            .await?;
        let reset = timeline_checklist.reset_statuses();
        if reset > 0 {
            debug!(reset, "checklist statuses reset to Not Started");
        }
        progress.stage_finished(stage, false);

        // --- Stage 6: event brief ---
        let stage = Stage::GenerateEventBrief;
        progress.stage_started(stage);
        let event_brief = self
            .hard_stage(
                stage,
                deadline,
                self.client.generate_text(
                    stages::BRIEF_INSTRUCTIONS,
                    &[Message::user(stages::brief_prompt(
                        &requirements,
                        &agenda,
                        &vendor_search_results,
                        &venue_details,
                        &timeline_checklist,
                    ))],
                ),
            )
            .await?;
        progress.stage_finished(stage, false);

        // --- Stage 7: email ---
        let stage = Stage::SendEmail;
        progress.stage_started(stage);
        let email_result = if requirements.has_stakeholders() {
            let recipients = &requirements.stakeholder_emails;
            match before_deadline(deadline, self.send_brief(recipients, &event_brief)).await {
                Some(outcome) => outcome,
                None => EmailOutcome::Failed {
                    reason: self.deadline_error().to_string(),
                },
            }
        } else {
            debug!("no stakeholder emails, skipping send");
            EmailOutcome::NotSent
        };
        progress.stage_finished(stage, matches!(email_result, EmailOutcome::Failed { .. }));

        let result = AggregateResult {
            event_requirements: requirements,
            event_agenda: agenda,
            vendor_search_results,
            venue_details,
            timeline_checklist,
            event_brief,
            email_result,
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "planning pipeline complete"
        );
        progress.done(&result);
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Stage helpers
    // -----------------------------------------------------------------------

    /// Run a stage whose failure aborts the pipeline.
    async fn hard_stage<T>(
        &self,
        stage: Stage,
        deadline: tokio::time::Instant,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = match before_deadline(deadline, work).await {
            Some(result) => result,
            None => Err(self.deadline_error()),
        };

        match result {
            Ok(value) => {
                info!(%stage, elapsed_ms = started.elapsed().as_millis() as u64, "stage complete");
                Ok(value)
            }
            Err(e) => {
                warn!(%stage, error = %e, "stage failed, aborting pipeline");
                Err(EvanaError::abort(stage, e))
            }
        }
    }

    /// Run a tool-augmented stage that degrades to placeholder text.
    ///
    /// Returns the stage text and whether it is degraded. Only the run
    /// deadline aborts.
    #[allow(clippy::too_many_arguments)]
    async fn research_stage(
        &self,
        stage: Stage,
        deadline: tokio::time::Instant,
        toolset: &[ToolKind],
        instructions: &str,
        prompt: &str,
        summary_instructions: &str,
        unavailable: fn(&str) -> String,
    ) -> Result<(String, bool)> {
        let started = Instant::now();
        let tool_loop = self.tool_loop(toolset);
        let work = tool_loop.run_and_summarize(instructions, prompt, summary_instructions);

        let Some(result) = before_deadline(deadline, work).await else {
            warn!(%stage, "run deadline exceeded");
            return Err(EvanaError::abort(stage, self.deadline_error()));
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(run) => {
                let degraded_calls = run.transcript.executions.iter().filter(|e| e.degraded).count();
                if run.partial {
                    warn!(%stage, "tool loop exceeded its guard, summarized partial results");
                }
                info!(
                    %stage,
                    elapsed_ms,
                    iterations = run.transcript.iterations,
                    tool_calls = run.transcript.executions.len(),
                    degraded_calls,
                    "stage complete"
                );
                Ok((run.summary, run.partial))
            }
            Err(e) => {
                warn!(%stage, elapsed_ms, error = %e, "stage degraded to placeholder");
                Ok((unavailable(&e.to_string()), true))
            }
        }
    }

    /// Ask the model to email the brief. Never fails.
    async fn send_brief(&self, recipients: &[String], brief: &str) -> EmailOutcome {
        let run = self
            .tool_loop(EMAIL_TOOLS)
            .run_and_summarize(
                stages::EMAIL_INSTRUCTIONS,
                &stages::email_prompt(recipients, brief),
                stages::EMAIL_SUMMARY_INSTRUCTIONS,
            )
            .await;

        let run = match run {
            Ok(run) => run,
            Err(e) => {
                warn!(error = %e, "email stage failed");
                return EmailOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let transcript = &run.transcript;
        let delivered = delivered_recipients(transcript);
        if !delivered.is_empty() {
            let missed: Vec<&str> = recipients
                .iter()
                .filter(|r| !delivered.iter().any(|d| d.eq_ignore_ascii_case(r.as_str())))
                .map(String::as_str)
                .collect();
            if missed.is_empty() {
                return EmailOutcome::sent(run.summary, delivered);
            }

            let reason = format!(
                "not delivered to {} (delivered to {})",
                missed.join(", "),
                delivered.join(", ")
            );
            warn!(%reason, "event brief reached only some stakeholders");
            return EmailOutcome::Failed { reason };
        }

        let reason = if transcript.called(ToolKind::SendEmail) {
            transcript
                .executions
                .iter()
                .rev()
                .filter(|e| e.tool == Some(ToolKind::SendEmail))
                .find_map(|e| serde_json::from_str::<EmailReceipt>(&e.payload).ok())
                .map(|receipt| receipt.message)
                .unwrap_or_else(|| "email provider failed".to_string())
        } else {
            "the model did not request send_email".to_string()
        };
        warn!(%reason, "event brief was not emailed");
        EmailOutcome::Failed { reason }
    }

    fn tool_loop<'a>(&'a self, toolset: &'a [ToolKind]) -> ToolLoop<'a> {
        ToolLoop::new(&self.client, &self.tools, toolset)
            .with_max_iterations(self.limits.max_tool_iterations)
            .with_concurrency(self.limits.tool_concurrency)
    }

    fn deadline_error(&self) -> EvanaError {
        EvanaError::timeout("pipeline run", self.limits.run_timeout)
    }
}

/// Recipients confirmed by successful `send_email` receipts, first
/// occurrence order.
fn delivered_recipients(transcript: &LoopTranscript) -> Vec<String> {
    let mut delivered: Vec<String> = Vec::new();
    let receipts = transcript
        .successful(ToolKind::SendEmail)
        .filter_map(|e| serde_json::from_str::<EmailReceipt>(&e.payload).ok())
        .filter(|receipt| receipt.success);
    for receipt in receipts {
        for recipient in receipt.recipients {
            if !delivered.iter().any(|d| d.eq_ignore_ascii_case(&recipient)) {
                delivered.push(recipient);
            }
        }
    }
    delivered
}

/// `None` when the deadline passes before `work` finishes.
async fn before_deadline<T>(
    deadline: tokio::time::Instant,
    work: impl Future<Output = T>,
) -> Option<T> {
    tokio::time::timeout_at(deadline, work).await.ok()
}

/// Resolve providers from `ctx` and run the pipeline once.
pub async fn run_pipeline(ctx: &RunContext, input: &str) -> Result<AggregateResult> {
    Pipeline::from_context(ctx)?.run(input, &SilentProgress).await
}
