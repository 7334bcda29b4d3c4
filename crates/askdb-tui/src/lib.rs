// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use askdb_app::{
    QueryOutcome, RenderedBody, RenderedItem, ResultTable, Role, Session, rendered_items,
};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const MAX_CELL_WIDTH: usize = 32;
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const INPUT_HINT: &str = "enter send | up/down history | /models | /model <name> | /help | esc quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    Finished {
        request_id: u64,
        outcome: QueryOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Query(QueryEvent),
}

/// Everything the chat screen needs from its host: provider readiness,
/// the query-generation capability, and model management. `run_query`
/// returns an outcome, never an error; failures are part of the value.
pub trait AppRuntime {
    fn provider_ready(&mut self) -> bool;
    fn run_query(&mut self, question: &str) -> QueryOutcome;
    fn list_models(&mut self) -> Result<Vec<String>>;
    fn active_model(&mut self) -> Result<Option<String>>;
    fn select_model(&mut self, model: &str) -> Result<()>;

    fn spawn_query(
        &mut self,
        request_id: u64,
        question: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = self.run_query(question);
        tx.send(InternalEvent::Query(QueryEvent::Finished {
            request_id,
            outcome,
        }))
        .map_err(|_| anyhow::anyhow!("query event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Help,
    Models,
    Model(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct OverlayState {
    visible: bool,
    title: &'static str,
    body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    input: String,
    history: Vec<String>,
    history_cursor: Option<usize>,
    history_buffer: String,
    in_flight: Option<u64>,
    status_line: Option<String>,
    status_token: u64,
    overlay: OverlayState,
}

pub fn run_app<R: AppRuntime>(session: &mut Session, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (internal_tx, internal_rx) = mpsc::channel();
    let mut view_data = ViewData::default();

    let result = event_loop(
        &mut terminal,
        session,
        runtime,
        &mut view_data,
        &internal_tx,
        &internal_rx,
    );

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    result
}

fn event_loop<R: AppRuntime>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    internal_rx: &Receiver<InternalEvent>,
) -> Result<()> {
    loop {
        process_internal_events(session, view_data, internal_rx);

        terminal
            .draw(|frame| render(frame, session, view_data))
            .context("draw frame")?;

        if !event::poll(Duration::from_millis(100)).context("poll terminal events")? {
            continue;
        }
        if let Event::Key(key) = event::read().context("read terminal event")?
            && handle_key_event(session, runtime, view_data, internal_tx, key)
        {
            return Ok(());
        }
    }
}

fn process_internal_events(
    session: &mut Session,
    view_data: &mut ViewData,
    internal_rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = internal_rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } => {
                if token == view_data.status_token {
                    view_data.status_line = None;
                }
            }
            InternalEvent::Query(QueryEvent::Finished {
                request_id,
                outcome,
            }) => {
                if view_data.in_flight == Some(request_id) {
                    view_data.in_flight = None;
                }
                // stale request ids are dropped by the session
                session.finish_question(request_id, outcome);
            }
        }
    }
}

/// Returns true when the app should exit.
fn handle_key_event<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if view_data.overlay.visible {
        view_data.overlay = OverlayState::default();
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            return true;
        }
        (KeyCode::Esc, _) => {
            if let Some(request_id) = view_data.in_flight.take() {
                session.cancel_question(request_id);
                emit_status(view_data, internal_tx, "query canceled");
                return false;
            }
            return true;
        }
        (KeyCode::Enter, _) => submit_input(session, runtime, view_data, internal_tx),
        (KeyCode::Up, _) => history_prev(view_data),
        (KeyCode::Char('p'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            history_prev(view_data);
        }
        (KeyCode::Down, _) => history_next(view_data),
        (KeyCode::Char('n'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            history_next(view_data);
        }
        (KeyCode::Backspace, _) => {
            view_data.input.pop();
            view_data.history_cursor = None;
        }
        (KeyCode::Char(ch), modifiers) => {
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT {
                view_data.input.push(ch);
                view_data.history_cursor = None;
            }
        }
        _ => {}
    }
    false
}

fn submit_input<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let input = view_data.input.trim().to_owned();
    if input.is_empty() {
        return;
    }

    if let Some(command) = parse_chat_command(&input) {
        view_data.input.clear();
        view_data.history_cursor = None;
        run_chat_command(runtime, view_data, internal_tx, command);
        return;
    }

    match session.begin_question(&input, runtime.provider_ready()) {
        Ok(request_id) => {
            view_data.input.clear();
            view_data.history_cursor = None;
            view_data.history_buffer.clear();
            if view_data.history.last() != Some(&input) {
                view_data.history.push(input.clone());
            }
            view_data.in_flight = Some(request_id);

            if let Err(error) = runtime.spawn_query(request_id, &input, internal_tx.clone()) {
                view_data.in_flight = None;
                session.finish_question(
                    request_id,
                    QueryOutcome::Failure {
                        detail: error.to_string(),
                    },
                );
            }
        }
        // rejected submissions keep the typed input
        Err(error) => emit_status(view_data, internal_tx, error.message()),
    }
}

fn run_chat_command<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: ChatCommand,
) {
    match command {
        ChatCommand::Help => {
            view_data.overlay = OverlayState {
                visible: true,
                title: "help",
                body: help_overlay_text().to_owned(),
            };
        }
        ChatCommand::Models => {
            let active = runtime.active_model().unwrap_or(None);
            match runtime.list_models() {
                Ok(models) => {
                    view_data.overlay = OverlayState {
                        visible: true,
                        title: "models",
                        body: render_model_list(&models, active.as_deref()),
                    };
                }
                Err(error) => {
                    emit_status(view_data, internal_tx, format!("model list failed: {error}"));
                }
            }
        }
        ChatCommand::Model(model) => match runtime.select_model(&model) {
            Ok(()) => emit_status(view_data, internal_tx, format!("model set: {model}")),
            Err(error) => {
                emit_status(view_data, internal_tx, format!("model switch failed: {error}"));
            }
        },
    }
}

fn parse_chat_command(input: &str) -> Option<ChatCommand> {
    match input {
        "/help" => return Some(ChatCommand::Help),
        "/models" => return Some(ChatCommand::Models),
        _ => {}
    }

    let model = input.strip_prefix("/model ")?.trim();
    if model.is_empty() {
        return None;
    }
    Some(ChatCommand::Model(model.to_owned()))
}

fn render_model_list(models: &[String], active: Option<&str>) -> String {
    if models.is_empty() {
        return "(no models available)".to_owned();
    }

    models
        .iter()
        .map(|model| {
            if Some(model.as_str()) == active {
                format!("* {model}")
            } else {
                format!("  {model}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn help_overlay_text() -> &'static str {
    "Ask a question about your database in plain language.\n\
     \n\
     /models        list available models\n\
     /model <name>  switch the active model\n\
     /help          show this help\n\
     \n\
     up/down        walk input history\n\
     esc            cancel the running query, or quit\n\
     \n\
     press any key to close"
}

fn history_prev(view_data: &mut ViewData) {
    if view_data.history.is_empty() {
        return;
    }

    let next_cursor = match view_data.history_cursor {
        None => {
            view_data.history_buffer = view_data.input.clone();
            view_data.history.len() - 1
        }
        Some(cursor) => cursor.saturating_sub(1),
    };
    view_data.history_cursor = Some(next_cursor);
    view_data.input = view_data.history[next_cursor].clone();
}

fn history_next(view_data: &mut ViewData) {
    let Some(cursor) = view_data.history_cursor else {
        return;
    };

    if cursor + 1 < view_data.history.len() {
        view_data.history_cursor = Some(cursor + 1);
        view_data.input = view_data.history[cursor + 1].clone();
    } else {
        view_data.history_cursor = None;
        view_data.input = view_data.history_buffer.clone();
    }
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status_line = Some(message.into());
    view_data.status_token += 1;
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let tx = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = tx.send(InternalEvent::ClearStatus { token });
    });
}

fn render(frame: &mut ratatui::Frame<'_>, session: &Session, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let transcript_height = layout[0].height.saturating_sub(2) as usize;
    let transcript = Paragraph::new(render_transcript_text(
        &rendered_items(session.transcript(), session.tables()),
        view_data.in_flight.is_some(),
        transcript_height,
    ))
    .block(Block::default().title("askdb").borders(Borders::ALL));
    frame.render_widget(transcript, layout[0]);

    let input = Paragraph::new(format!("> {}", view_data.input))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(input, layout[1]);

    let status = view_data
        .status_line
        .clone()
        .unwrap_or_else(|| INPUT_HINT.to_owned());
    let status_widget = Paragraph::new(status)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if view_data.overlay.visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(view_data.overlay.body.clone()).block(
            Block::default()
                .title(view_data.overlay.title)
                .borders(Borders::ALL),
        );
        frame.render_widget(overlay, area);
    }
}

fn render_transcript_text(items: &[RenderedItem], thinking: bool, max_lines: usize) -> String {
    let mut lines = Vec::new();
    for item in items {
        let label = match item.role {
            Role::User => "you",
            Role::Assistant => "db",
        };
        match &item.body {
            RenderedBody::Text(text) => {
                for (index, segment) in text.lines().enumerate() {
                    if index == 0 {
                        lines.push(format!("{label}: {segment}"));
                    } else {
                        lines.push(format!("     {segment}"));
                    }
                }
                if text.is_empty() {
                    lines.push(format!("{label}:"));
                }
            }
            RenderedBody::Table(table) => {
                for segment in render_table_grid(table) {
                    lines.push(format!("  {segment}"));
                }
            }
        }
    }

    if thinking {
        lines.push("db: thinking...".to_owned());
    }

    if max_lines > 0 && lines.len() > max_lines {
        lines.drain(..lines.len() - max_lines);
    }
    lines.join("\n")
}

fn render_table_grid(table: &ResultTable) -> Vec<String> {
    if table.rows.is_empty() {
        return vec!["(no rows)".to_owned()];
    }

    let mut widths: Vec<usize> = table
        .columns
        .iter()
        .map(|column| column.chars().count().min(MAX_CELL_WIDTH))
        .collect();
    for row in &table.rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count().min(MAX_CELL_WIDTH));
            }
        }
    }

    let mut lines = Vec::with_capacity(table.rows.len() + 2);
    lines.push(format_grid_row(&table.columns, &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &table.rows {
        lines.push(format_grid_row(row, &widths));
    }
    lines
}

fn format_grid_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let width = *width;
            let truncated = truncate_cell(cell, MAX_CELL_WIDTH);
            format!("{truncated:<width$}")
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_owned()
}

fn truncate_cell(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut truncated: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
