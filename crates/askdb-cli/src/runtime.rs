// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use askdb_app::{QueryOutcome, ResultTable};
use askdb_db::Store;
use askdb_llm::{Client, ColumnInfo, Message, Role, TableInfo, build_sql_prompt, extract_sql};
use askdb_tui::{AppRuntime, InternalEvent, QueryEvent};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;
use time::OffsetDateTime;

/// Host side of the chat screen: owns the store and the resolved client
/// and turns questions into outcomes by prompting the model for SQL and
/// running it read-only.
pub struct AgentRuntime {
    store: Store,
    db_path: Option<PathBuf>,
    client: Option<Client>,
    extra_context: String,
}

impl AgentRuntime {
    pub fn new(
        store: Store,
        db_path: Option<PathBuf>,
        client: Option<Client>,
        extra_context: &str,
    ) -> Self {
        Self {
            store,
            db_path,
            client,
            extra_context: extra_context.to_owned(),
        }
    }
}

impl AppRuntime for AgentRuntime {
    fn provider_ready(&mut self) -> bool {
        self.client.is_some()
    }

    fn run_query(&mut self, question: &str) -> QueryOutcome {
        let Some(client) = &self.client else {
            return QueryOutcome::Failure {
                detail: "no provider is configured; enable [llm] in the config".to_owned(),
            };
        };
        answer(&self.store, client, &self.extra_context, question)
    }

    fn list_models(&mut self) -> Result<Vec<String>> {
        let Some(client) = &self.client else {
            bail!("no provider is configured");
        };
        client.list_models()
    }

    fn active_model(&mut self) -> Result<Option<String>> {
        Ok(self.client.as_ref().map(|client| client.model().to_owned()))
    }

    fn select_model(&mut self, model: &str) -> Result<()> {
        let Some(client) = &mut self.client else {
            bail!("no provider is configured");
        };
        if model.trim().is_empty() {
            bail!("model name must not be empty");
        }
        client.set_model(model.trim());
        Ok(())
    }

    fn spawn_query(
        &mut self,
        request_id: u64,
        question: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        // With a filesystem database the question runs on a worker thread
        // that opens its own connection; in-memory databases have nothing
        // to reopen, so they run inline on the UI thread.
        let (Some(db_path), Some(client)) = (self.db_path.clone(), self.client.clone()) else {
            let outcome = self.run_query(question);
            tx.send(InternalEvent::Query(QueryEvent::Finished {
                request_id,
                outcome,
            }))
            .map_err(|_| anyhow!("query event channel closed"))?;
            return Ok(());
        };

        let question = question.to_owned();
        let extra_context = self.extra_context.clone();
        thread::spawn(move || {
            let outcome = match Store::open(&db_path) {
                Ok(store) => answer(&store, &client, &extra_context, &question),
                Err(error) => QueryOutcome::Failure {
                    detail: format!("{error:#}"),
                },
            };
            let _ = tx.send(InternalEvent::Query(QueryEvent::Finished {
                request_id,
                outcome,
            }));
        });
        Ok(())
    }
}

/// The query-generation pipeline. Every failure folds into the outcome;
/// nothing escapes to the caller.
fn answer(store: &Store, client: &Client, extra_context: &str, question: &str) -> QueryOutcome {
    match generate_and_run(store, client, extra_context, question) {
        Ok((sql, table)) => QueryOutcome::Success {
            sql: Some(sql),
            table,
        },
        Err(error) => QueryOutcome::Failure {
            detail: format!("{error:#}"),
        },
    }
}

fn generate_and_run(
    store: &Store,
    client: &Client,
    extra_context: &str,
    question: &str,
) -> Result<(String, ResultTable)> {
    let tables = schema_info(store)?;
    if tables.is_empty() {
        bail!("the database has no tables to query");
    }

    let context = if extra_context.is_empty() {
        None
    } else {
        Some(extra_context)
    };
    let prompt = build_sql_prompt(&tables, OffsetDateTime::now_utc(), context);
    let reply = client
        .chat_complete(&[
            Message {
                role: Role::System,
                content: prompt,
            },
            Message {
                role: Role::User,
                content: question.to_owned(),
            },
        ])
        .context("generate query")?;

    let sql = extract_sql(&reply);
    if sql.is_empty() {
        bail!("the model returned no SQL for this question");
    }

    let (columns, rows) = store
        .read_only_query(&sql)
        .with_context(|| format!("run generated query {sql:?}"))?;
    Ok((sql, ResultTable::new(columns, rows)))
}

fn schema_info(store: &Store) -> Result<Vec<TableInfo>> {
    let mut tables = Vec::new();
    for name in store.table_names()? {
        let columns = store
            .table_columns(&name)?
            .into_iter()
            .map(|column| ColumnInfo {
                name: column.name,
                column_type: column.column_type,
                not_null: column.not_null,
                primary_key: column.primary_key != 0,
            })
            .collect();
        tables.push(TableInfo { name, columns });
    }
    Ok(tables)
}
