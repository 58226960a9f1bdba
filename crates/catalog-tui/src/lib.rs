// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use catalog_app::{
    AppCommand, AppEvent, AppState, COLUMNS, DialogState, ItemField, ItemFields, ItemId,
    ItemRecord, MutationKind, MutationRequest, ToastSeverity,
};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const FOCUS_MARK: &str = "▸";

/// Everything the front end needs from the outside world. The live feed
/// posts `InternalEvent::ItemsChanged` into the channel it is given.
pub trait AppRuntime {
    fn open_item_feed(&mut self, tx: Sender<InternalEvent>) -> Result<()>;
    fn close_item_feed(&mut self) -> Result<()>;
    fn create_item(&mut self, fields: &ItemFields) -> Result<ItemId>;
    fn update_item(&mut self, id: &ItemId, fields: &ItemFields) -> Result<()>;
    fn delete_item(&mut self, id: &ItemId) -> Result<()>;
    fn spawn_mutation(
        &mut self,
        request: &MutationRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = match request {
            MutationRequest::Create(fields) => self.create_item(fields).map(|_| ()),
            MutationRequest::Update { id, fields } => self.update_item(id, fields),
            MutationRequest::Delete(id) => self.delete_item(id),
        };
        tx.send(InternalEvent::MutationSettled {
            kind: request.kind(),
            outcome: outcome.map_err(|error| format!("{error:#}")),
        })
        .map_err(|_| anyhow::anyhow!("mutation event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ItemsChanged(Vec<ItemRecord>),
    MutationSettled {
        kind: MutationKind,
        outcome: Result<(), String>,
    },
    ToastExpired { token: u64 },
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct TableUiState {
    page: usize,
    selected_row: usize,
    filter_editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    table: TableUiState,
    status_token: u64,
    toast_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = runtime.open_item_feed(internal_tx.clone()) {
        tracing::error!(error = %format!("{error:#}"), "open product feed");
        emit_status(
            state,
            &mut view_data,
            &internal_tx,
            format!("load failed: {error}"),
        );
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    if let Err(error) = runtime.close_item_feed() {
        tracing::warn!(error = %format!("{error:#}"), "close product feed");
    }
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ItemsChanged(items) => {
                tracing::debug!(items = items.len(), "product snapshot");
                let events = state.dispatch(AppCommand::ReplaceItems(items));
                apply_view_effects(state, view_data, tx, &events);
            }
            InternalEvent::MutationSettled { kind, outcome } => {
                match &outcome {
                    Ok(()) => tracing::info!(kind = kind.verb(), "mutation succeeded"),
                    Err(error) => tracing::error!(kind = kind.verb(), %error, "mutation failed"),
                }
                let events = state.dispatch(AppCommand::MutationSettled { kind, outcome });
                apply_view_effects(state, view_data, tx, &events);
            }
            InternalEvent::ToastExpired { token } if token == view_data.toast_token => {
                state.dispatch(AppCommand::DismissToast);
            }
            InternalEvent::ToastExpired { .. } => {}
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

/// Timers and selection bookkeeping that follow state events. Mutation
/// requests are handled by the caller, which owns the runtime.
fn apply_view_effects(
    state: &AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    events: &[AppEvent],
) {
    for event in events {
        match event {
            AppEvent::ToastShown(toast) => {
                view_data.toast_token = view_data.toast_token.saturating_add(1);
                schedule_toast_expiry(tx, view_data.toast_token, toast.life);
            }
            AppEvent::StatusUpdated(_) => {
                view_data.status_token = view_data.status_token.saturating_add(1);
                schedule_status_clear(tx, view_data.status_token);
            }
            AppEvent::FilterChanged(_) | AppEvent::RowsPerPageChanged(_) => {
                view_data.table.page = 0;
                view_data.table.selected_row = 0;
            }
            AppEvent::ItemsReplaced(_) => clamp_selection(state, view_data),
            _ => {}
        }
    }
}

fn dispatch_with_runtime<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    apply_view_effects(state, view_data, tx, &events);
    for event in events {
        if let AppEvent::MutationRequested(request) = event {
            tracing::info!(kind = request.kind().verb(), "mutation requested");
            if let Err(error) = runtime.spawn_mutation(&request, tx.clone()) {
                let settled = state.dispatch(AppCommand::MutationSettled {
                    kind: request.kind(),
                    outcome: Err(format!("{error:#}")),
                });
                apply_view_effects(state, view_data, tx, &settled);
            }
        }
    }
}

fn schedule_toast_expiry(internal_tx: &Sender<InternalEvent>, token: u64, life: Duration) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(life);
        let _ = sender.send(InternalEvent::ToastExpired { token });
    });
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    let events = state.dispatch(AppCommand::SetStatus(message.into()));
    apply_view_effects(state, view_data, internal_tx, &events);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match state.dialog {
        DialogState::Editing { .. } => {
            handle_form_key(state, runtime, view_data, internal_tx, key);
            false
        }
        DialogState::ConfirmingDelete(_) => {
            handle_delete_key(state, runtime, view_data, internal_tx, key);
            false
        }
        DialogState::Idle if view_data.table.filter_editing => {
            handle_filter_key(state, view_data, internal_tx, key);
            false
        }
        DialogState::Idle => handle_table_key(state, runtime, view_data, internal_tx, key),
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            dispatch_with_runtime(state, runtime, view_data, internal_tx, AppCommand::HideDialog)
        }
        KeyCode::Enter => {
            dispatch_with_runtime(state, runtime, view_data, internal_tx, AppCommand::Save)
        }
        KeyCode::Tab | KeyCode::Down => state.form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => state.form.focus_prev(),
        KeyCode::Backspace => state.form.backspace(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.form.clear_field();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.form.insert_char(ch);
        }
        _ => {}
    }
}

fn handle_delete_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let command = match key.code {
        KeyCode::Char('y') | KeyCode::Enter => AppCommand::ConfirmDelete,
        KeyCode::Char('n') | KeyCode::Esc => AppCommand::CancelDelete,
        _ => return,
    };
    dispatch_with_runtime(state, runtime, view_data, internal_tx, command);
}

fn handle_filter_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let mut filter = state.filter.clone();
    match key.code {
        KeyCode::Esc => {
            filter.clear();
            view_data.table.filter_editing = false;
        }
        KeyCode::Enter => {
            view_data.table.filter_editing = false;
            return;
        }
        KeyCode::Backspace => {
            filter.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => filter.push(ch),
        _ => return,
    }
    if filter != state.filter {
        let events = state.dispatch(AppCommand::SetFilter(filter));
        apply_view_effects(state, view_data, internal_tx, &events);
    }
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => move_selection(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_selection(state, view_data, -1),
        KeyCode::PageDown | KeyCode::Char(']') => change_page(state, view_data, 1),
        KeyCode::PageUp | KeyCode::Char('[') => change_page(state, view_data, -1),
        KeyCode::Char('p') => {
            let events = state.dispatch(AppCommand::CycleRowsPerPage);
            apply_view_effects(state, view_data, internal_tx, &events);
        }
        KeyCode::Char('/') => view_data.table.filter_editing = true,
        KeyCode::Char('n') => {
            dispatch_with_runtime(state, runtime, view_data, internal_tx, AppCommand::OpenNew)
        }
        KeyCode::Char('e') | KeyCode::Enter => match selected_record(state, view_data) {
            Some(record) => dispatch_with_runtime(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::Edit(record),
            ),
            None => emit_status(
                state,
                view_data,
                internal_tx,
                "no product selected -- press n to add one",
            ),
        },
        KeyCode::Char('d') => match selected_record(state, view_data) {
            Some(record) => dispatch_with_runtime(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::RequestDelete(record),
            ),
            None => emit_status(
                state,
                view_data,
                internal_tx,
                "no product selected -- move to a row and retry",
            ),
        },
        KeyCode::Esc => {
            state.dispatch(AppCommand::DismissToast);
        }
        _ => {}
    }
    false
}

fn page_count(state: &AppState) -> usize {
    let rows = state.rows_per_page.max(1);
    state.visible_items().len().div_ceil(rows).max(1)
}

fn page_bounds(state: &AppState, view_data: &ViewData) -> (usize, usize) {
    let total = state.visible_items().len();
    let rows = state.rows_per_page.max(1);
    let start = (view_data.table.page * rows).min(total);
    let end = (start + rows).min(total);
    (start, end)
}

fn clamp_selection(state: &AppState, view_data: &mut ViewData) {
    let pages = page_count(state);
    if view_data.table.page >= pages {
        view_data.table.page = pages - 1;
    }
    let (start, end) = page_bounds(state, view_data);
    let rows_on_page = end - start;
    if rows_on_page == 0 {
        view_data.table.selected_row = 0;
    } else if view_data.table.selected_row >= rows_on_page {
        view_data.table.selected_row = rows_on_page - 1;
    }
}

fn move_selection(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let (start, end) = page_bounds(state, view_data);
    let rows_on_page = end - start;
    if rows_on_page == 0 {
        return;
    }
    let next = view_data
        .table
        .selected_row
        .saturating_add_signed(delta)
        .min(rows_on_page - 1);
    view_data.table.selected_row = next;
}

fn change_page(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let last = page_count(state) - 1;
    let next = view_data.table.page.saturating_add_signed(delta).min(last);
    if next != view_data.table.page {
        view_data.table.page = next;
        view_data.table.selected_row = 0;
    }
}

fn selected_record(state: &AppState, view_data: &ViewData) -> Option<ItemRecord> {
    let (start, _) = page_bounds(state, view_data);
    state
        .visible_items()
        .get(start + view_data.table.selected_row)
        .map(|record| (*record).clone())
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(state, view_data))
        .block(Block::default().title("catalog").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_table(frame, layout[1], state, view_data);

    let paginator = Paragraph::new(paginator_text(state, view_data))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(paginator, layout[2]);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_widget, layout[3]);

    match &state.dialog {
        DialogState::Idle => {}
        DialogState::Editing { target } => {
            let area = centered_rect(60, 50, frame.area());
            frame.render_widget(Clear, area);
            let title = if target.is_some() {
                "edit product"
            } else {
                "new product"
            };
            let form = Paragraph::new(render_form_text(state))
                .block(Block::default().title(title).borders(Borders::ALL));
            frame.render_widget(form, area);
        }
        DialogState::ConfirmingDelete(record) => {
            let area = centered_rect(48, 22, frame.area());
            frame.render_widget(Clear, area);
            let confirm = Paragraph::new(render_delete_text(record)).block(
                Block::default()
                    .title("confirm")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            );
            frame.render_widget(confirm, area);
        }
    }

    if let Some(toast) = &state.toast {
        let area = toast_rect(frame.area());
        frame.render_widget(Clear, area);
        let color = match toast.severity {
            ToastSeverity::Success => Color::Green,
            ToastSeverity::Error => Color::Red,
        };
        let widget = Paragraph::new(toast.detail.clone()).block(
            Block::default()
                .title(toast.summary.clone())
                .borders(Borders::ALL)
                .style(Style::default().fg(color)),
        );
        frame.render_widget(widget, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let header_cells = COLUMNS.iter().map(|column| {
        Cell::from(column.header).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells);

    let (start, end) = page_bounds(state, view_data);
    let visible = state.visible_items();
    let rows = visible[start..end]
        .iter()
        .enumerate()
        .map(|(row_index, record)| {
            let mut style = Style::default();
            if row_index == view_data.table.selected_row {
                style = style
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            let cells = COLUMNS
                .iter()
                .map(|column| Cell::from(record.fields.display(column.field)))
                .collect::<Vec<_>>();
            Row::new(cells).style(style)
        });

    let widths = [
        Constraint::Percentage(20),
        Constraint::Percentage(34),
        Constraint::Percentage(18),
        Constraint::Percentage(14),
        Constraint::Percentage(14),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title("products").borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn header_text(state: &AppState, view_data: &ViewData) -> String {
    let filter = if view_data.table.filter_editing {
        format!("search: {}_", state.filter)
    } else if state.filter.is_empty() {
        "search: (press /)".to_owned()
    } else {
        format!("search: {}", state.filter)
    };
    format!("{} products | {filter}", state.items.len())
}

fn paginator_text(state: &AppState, view_data: &ViewData) -> String {
    let total = state.visible_items().len();
    let (start, end) = page_bounds(state, view_data);
    let first = if total == 0 { 0 } else { start + 1 };
    format!(
        "Showing {first} to {end} of {total} entries | page {}/{} | {} per page",
        view_data.table.page + 1,
        page_count(state),
        state.rows_per_page
    )
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let hints = match &state.dialog {
        DialogState::Editing { .. } => {
            "tab/shift+tab field | ctrl+u clear | enter save | esc cancel"
        }
        DialogState::ConfirmingDelete(_) => "y/enter delete | n/esc keep",
        DialogState::Idle if view_data.table.filter_editing => {
            "type to filter | enter keep | esc clear"
        }
        DialogState::Idle => {
            "j/k move | [/] page | p page size | / search | n new | e edit | d delete | q quit"
        }
    };
    let busy = state
        .in_flight
        .map(|kind| format!("{}... | ", kind.verb()))
        .unwrap_or_default();
    match &state.status_line {
        Some(status) => format!("{busy}{status} | {hints}"),
        None => format!("{busy}{hints}"),
    }
}

fn render_form_text(state: &AppState) -> String {
    let focused = state.form.focused_field();
    let mut lines = Vec::with_capacity(ItemField::ALL.len() + 2);
    for field in ItemField::ALL {
        let marker = if field == focused { FOCUS_MARK } else { " " };
        lines.push(format!(
            "{marker} {:<12} {}",
            format!("{}:", field.label()),
            state.form.field_value(field)
        ));
    }
    lines.push(String::new());
    match state.form.validate() {
        Ok(_) => lines.push("enter to save".to_owned()),
        Err(error) => lines.push(error.to_string()),
    }
    lines.join("\n")
}

fn render_delete_text(record: &ItemRecord) -> String {
    format!(
        "Are you sure you want to delete {}?\n\ny/enter delete | n/esc keep",
        record.fields.name
    )
}

fn toast_rect(area: Rect) -> Rect {
    let width = area.width.min(42);
    let height = area.height.min(4);
    Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 1,
        width,
        height,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}
