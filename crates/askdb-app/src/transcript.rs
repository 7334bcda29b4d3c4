// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Index into the session's [`TableRegistry`], assigned at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef(usize);

impl TableRef {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A message body is either plain text or a reference into the registry,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Text(String),
    TableRef(TableRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub body: MessageBody,
}

/// Ordered chat history. Messages are appended in display order and never
/// mutated or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn append_text(&mut self, role: Role, text: impl Into<String>) {
        self.append(Message {
            role,
            body: MessageBody::Text(text.into()),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Append-only store of result tables. Slots are write-once; the registry
/// never shrinks, so an assigned [`TableRef`] stays valid forever.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRegistry {
    tables: Vec<ResultTable>,
}

impl TableRegistry {
    pub fn append(&mut self, table: ResultTable) -> TableRef {
        let reference = TableRef::new(self.tables.len());
        self.tables.push(table);
        reference
    }

    pub fn get(&self, reference: TableRef) -> Option<&ResultTable> {
        self.tables.get(reference.get())
    }

    pub fn require(&self, reference: TableRef) -> Result<&ResultTable> {
        match self.get(reference) {
            Some(table) => Ok(table),
            None => bail!(
                "invalid table reference {} ({} tables stored)",
                reference.get(),
                self.tables.len()
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
