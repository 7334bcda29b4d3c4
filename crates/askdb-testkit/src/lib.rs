// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use askdb_app::{QueryOutcome, ResultTable, Session};

/// Result of the canonical "what tables exist" question.
pub fn table_names_table() -> ResultTable {
    ResultTable::new(
        vec!["name".to_owned()],
        vec![
            vec!["customers".to_owned()],
            vec!["orders".to_owned()],
            vec!["territories".to_owned()],
        ],
    )
}

/// A small aggregate grid with mixed column widths, for render tests.
pub fn sales_by_territory_table() -> ResultTable {
    ResultTable::new(
        vec!["territory".to_owned(), "total_dollars".to_owned()],
        vec![
            vec!["Harborview".to_owned(), "1845.50".to_owned()],
            vec!["Northlake".to_owned(), "912.00".to_owned()],
            vec!["Riverside".to_owned(), "87.25".to_owned()],
        ],
    )
}

pub fn empty_table() -> ResultTable {
    ResultTable::new(
        vec!["name".to_owned(), "region".to_owned()],
        Vec::new(),
    )
}

/// Drive a session through `count` successful question rounds.
pub fn session_with_results(count: usize) -> Result<Session> {
    let mut session = Session::new();
    for round in 0..count {
        let Ok(request_id) = session.begin_question(&format!("question {round}"), true) else {
            bail!("question {round} should dispatch");
        };
        let applied = session.finish_question(
            request_id,
            QueryOutcome::Success {
                sql: Some(format!("SELECT {round} AS round")),
                table: table_names_table(),
            },
        );
        if !applied {
            bail!("outcome {round} should apply");
        }
    }
    Ok(session)
}
