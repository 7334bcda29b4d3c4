// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

pub fn build_sql_prompt(
    tables: &[TableInfo],
    now: OffsetDateTime,
    extra_context: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str(
        "You are a SQL generator for a SQLite database. Output only a single SELECT statement.\n",
    );
    out.push_str("\n## Current date\n\n");
    out.push_str(&format!("Today is {}.\n", format_human_date(now)));
    out.push_str("\n## Schema\n\n```sql\n");
    for table in tables {
        out.push_str(&format_ddl(table));
        out.push('\n');
    }
    out.push_str("```\n");
    out.push_str("\nRules:\n");
    out.push_str("1. Never emit INSERT/UPDATE/DELETE/DDL.\n");
    out.push_str("2. Use LOWER() on both sides of text comparisons.\n");
    out.push_str("3. Output the bare statement with no commentary or trailing semicolon.\n");
    if let Some(context) = extra_context
        && !context.is_empty()
    {
        out.push_str("\n## Additional context\n\n");
        out.push_str(context);
        out.push('\n');
    }
    out
}

/// Pull a bare SQL statement out of a model reply, tolerating fenced code
/// blocks and trailing semicolons.
pub fn extract_sql(raw: &str) -> String {
    let mut sql = raw.trim().to_owned();
    if sql.starts_with("```") {
        let mut lines: Vec<&str> = sql.lines().collect();
        if !lines.is_empty() {
            lines.remove(0);
        }
        if let Some(idx) = lines.iter().rposition(|line| line.trim() == "```") {
            lines.truncate(idx);
        }
        sql = lines.join("\n").trim().to_owned();
    }
    sql.trim_end_matches(';').trim().to_owned()
}

fn format_ddl(table: &TableInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("CREATE TABLE {} (\n", table.name));
    for (index, column) in table.columns.iter().enumerate() {
        out.push_str("  ");
        out.push_str(&column.name);
        out.push(' ');
        out.push_str(&column.column_type);
        if column.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        if column.not_null {
            out.push_str(" NOT NULL");
        }
        if index + 1 < table.columns.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(");\n");
    out
}

fn format_human_date(now: OffsetDateTime) -> String {
    now.date()
        .format(&time::macros::format_description!(
            "[weekday repr:long], [month repr:long] [day], [year]"
        ))
        .unwrap_or_else(|_| now.date().to_string())
}

#[cfg(test)]
mod tests {
    use super::{ColumnInfo, TableInfo, build_sql_prompt, extract_sql};
    use time::OffsetDateTime;

    fn orders_table() -> TableInfo {
        TableInfo {
            name: "orders".to_owned(),
            columns: vec![
                ColumnInfo {
                    name: "id".to_owned(),
                    column_type: "INTEGER".to_owned(),
                    not_null: true,
                    primary_key: true,
                },
                ColumnInfo {
                    name: "total_cents".to_owned(),
                    column_type: "INTEGER".to_owned(),
                    not_null: true,
                    primary_key: false,
                },
            ],
        }
    }

    #[test]
    fn build_sql_prompt_includes_schema_ddl() {
        let prompt = build_sql_prompt(&[orders_table()], OffsetDateTime::UNIX_EPOCH, None);
        assert!(prompt.contains("CREATE TABLE orders"));
        assert!(prompt.contains("id INTEGER PRIMARY KEY NOT NULL"));
        assert!(prompt.contains("total_cents INTEGER NOT NULL"));
    }

    #[test]
    fn build_sql_prompt_includes_rules_and_date() {
        let prompt = build_sql_prompt(&[orders_table()], OffsetDateTime::UNIX_EPOCH, None);
        assert!(prompt.contains("Output only a single SELECT statement"));
        assert!(prompt.contains("Never emit INSERT/UPDATE/DELETE/DDL."));
        assert!(prompt.contains("January"));
        assert!(prompt.contains("1970"));
    }

    #[test]
    fn build_sql_prompt_includes_extra_context_when_present() {
        let prompt = build_sql_prompt(
            &[orders_table()],
            OffsetDateTime::UNIX_EPOCH,
            Some("Money columns are cents."),
        );
        assert!(prompt.contains("## Additional context"));
        assert!(prompt.contains("Money columns are cents."));

        let without = build_sql_prompt(&[orders_table()], OffsetDateTime::UNIX_EPOCH, Some(""));
        assert!(!without.contains("## Additional context"));
    }

    #[test]
    fn extract_sql_handles_fenced_blocks() {
        let raw = "```sql\nSELECT * FROM orders;\n```";
        assert_eq!(extract_sql(raw), "SELECT * FROM orders");
    }

    #[test]
    fn extract_sql_handles_bare_fenced_blocks() {
        let raw = "```\nSELECT COUNT(*) FROM customers\n```";
        assert_eq!(extract_sql(raw), "SELECT COUNT(*) FROM customers");
    }

    #[test]
    fn extract_sql_trims_whitespace_and_semicolons() {
        assert_eq!(extract_sql("  SELECT 1;  "), "SELECT 1");
        assert_eq!(
            extract_sql("\nSELECT * FROM orders;;\n"),
            "SELECT * FROM orders"
        );
    }
}
