// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::transcript::{MessageBody, ResultTable, Role, TableRegistry, Transcript};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBody {
    Text(String),
    Table(ResultTable),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedItem {
    pub role: Role,
    pub body: RenderedBody,
}

/// Replay the transcript into display items, dereferencing table
/// references through the registry. Pure and total: a dangling reference
/// (impossible for session-produced transcripts) renders as a visible
/// placeholder instead of failing.
pub fn rendered_items(transcript: &Transcript, tables: &TableRegistry) -> Vec<RenderedItem> {
    transcript
        .messages()
        .iter()
        .map(|message| {
            let body = match &message.body {
                MessageBody::Text(text) => RenderedBody::Text(text.clone()),
                MessageBody::TableRef(reference) => match tables.get(*reference) {
                    Some(table) => RenderedBody::Table(table.clone()),
                    None => RenderedBody::Text(format!("[missing table {}]", reference.get())),
                },
            };
            RenderedItem {
                role: message.role,
                body,
            }
        })
        .collect()
}
