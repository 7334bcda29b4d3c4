// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::transcript::{Message, MessageBody, ResultTable, Role, TableRef, TableRegistry, Transcript};

pub const GREETING: &str = "How can I help you?";

/// Result of one backend invocation. The backend boundary returns this
/// tagged value instead of raising; the session matches on the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Success {
        sql: Option<String>,
        table: ResultTable,
    },
    Failure {
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    EmptyQuestion,
    QuestionPending,
    ProviderNotReady,
}

impl SubmitError {
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyQuestion => "enter a question first",
            Self::QuestionPending => "a question is already running; wait for it to finish",
            Self::ProviderNotReady => "provider is not configured; fix the [llm] config first",
        }
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for SubmitError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Idle,
    Dispatched { request_id: u64 },
}

/// One user session: the transcript, its result tables, and the state of
/// the single allowed in-flight question. Owned by the caller and mutated
/// only from the session's thread of control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    transcript: Transcript,
    tables: TableRegistry,
    state: DispatchState,
    next_request_id: u64,
}

impl Session {
    pub fn new() -> Self {
        let mut transcript = Transcript::default();
        transcript.append_text(Role::Assistant, GREETING);
        Self {
            transcript,
            tables: TableRegistry::default(),
            state: DispatchState::Idle,
            next_request_id: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self.state, DispatchState::Dispatched { .. })
    }

    /// Append a table reference, validating it against the registry.
    pub fn append_table_reference(&mut self, role: Role, reference: TableRef) -> Result<()> {
        self.tables.require(reference)?;
        self.transcript.append(Message {
            role,
            body: MessageBody::TableRef(reference),
        });
        Ok(())
    }

    /// Entry guard and dispatch. Every rejection leaves the transcript and
    /// registry untouched. On success the user message is appended and the
    /// returned request id must be handed back to [`Self::finish_question`].
    pub fn begin_question(
        &mut self,
        question: &str,
        provider_ready: bool,
    ) -> Result<u64, SubmitError> {
        if self.is_dispatched() {
            return Err(SubmitError::QuestionPending);
        }
        if question.trim().is_empty() {
            return Err(SubmitError::EmptyQuestion);
        }
        if !provider_ready {
            return Err(SubmitError::ProviderNotReady);
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.transcript.append_text(Role::User, question.trim());
        self.state = DispatchState::Dispatched { request_id };
        Ok(request_id)
    }

    /// Apply the outcome of a dispatched question and return to idle.
    /// Outcomes for stale or unknown request ids are dropped (returns
    /// false) so an abandoned request can never touch the transcript.
    pub fn finish_question(&mut self, request_id: u64, outcome: QueryOutcome) -> bool {
        match self.state {
            DispatchState::Dispatched { request_id: active } if active == request_id => {}
            _ => return false,
        }
        self.state = DispatchState::Idle;

        match outcome {
            QueryOutcome::Success { sql, table } => {
                // The reference comes from the append itself, so the
                // table-ref message below can never dangle.
                let reference = self.tables.append(table);
                self.transcript.append_text(Role::Assistant, success_note(sql.as_deref()));
                self.transcript.append(Message {
                    role: Role::Assistant,
                    body: MessageBody::TableRef(reference),
                });
            }
            QueryOutcome::Failure { detail } => {
                self.transcript
                    .append_text(Role::Assistant, failure_note(&detail));
            }
        }
        true
    }

    /// Abandon the in-flight question, recording a canceled entry. The
    /// request's late outcome, if it ever arrives, is ignored.
    pub fn cancel_question(&mut self, request_id: u64) -> bool {
        self.finish_question(
            request_id,
            QueryOutcome::Failure {
                detail: "canceled".to_owned(),
            },
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn success_note(sql: Option<&str>) -> String {
    match sql {
        Some(sql) if !sql.trim().is_empty() => format!("Ran this query:\n{}", sql.trim()),
        _ => "Here is the result.".to_owned(),
    }
}

fn failure_note(detail: &str) -> String {
    let flattened = detail
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "I couldn't answer that question. Try adding more detail and ask again. (error: {flattened})"
    )
}
