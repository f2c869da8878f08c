// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use shopkeep_app::{
    Column, PostWriteAction, Product, ProductFormInput, ProductId, RowMode, TableCommand,
    TableModel, WritePolicy,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const FOCUS_MARK: &str = "▼";
const STATE_COLUMN_LABEL: &str = "state";

// The seam between the UI and the record store. The CLI backs this with the
// HTTP client; tests back it with a recording fake.
pub trait AppRuntime {
    fn list_products(&mut self) -> Result<Vec<Product>>;
    fn create_product(&mut self, product: &Product) -> Result<()>;
    fn update_product(&mut self, id: ProductId, product: &Product) -> Result<()>;
    fn delete_product(&mut self, id: ProductId) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Table,
    Form,
    FilterStatus,
    FilterId,
}

impl Pane {
    // The form is entered with `a` and left with esc; tab cycles the rest.
    fn next(self) -> Self {
        match self {
            Self::Table => Self::FilterStatus,
            Self::FilterStatus => Self::FilterId,
            Self::FilterId => Self::Table,
            Self::Form => Self::Form,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Table => Self::FilterId,
            Self::FilterStatus => Self::Table,
            Self::FilterId => Self::FilterStatus,
            Self::Form => Self::Form,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Form => "new product",
            Self::FilterStatus => "status filter",
            Self::FilterId => "id filter",
        }
    }
}

#[derive(Debug)]
struct UiState {
    pane: Pane,
    cursor: usize,
    active_column: Column,
    form: ProductFormInput,
    form_field: Column,
    status_line: Option<String>,
    status_token: u64,
    help_visible: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            pane: Pane::Table,
            cursor: 0,
            active_column: Column::Id,
            form: ProductFormInput::default(),
            form_field: Column::Id,
            status_line: None,
            status_token: 0,
            help_visible: false,
        }
    }
}

pub enum InternalEvent {
    ClearStatus { token: u64 },
}

pub fn run_app<R: AppRuntime>(
    model: &mut TableModel,
    runtime: &mut R,
    policy: WritePolicy,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut ui = UiState::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let status = reload_table(model, runtime);
    emit_status(&mut ui, &internal_tx, status);

    let mut result = Ok(());
    loop {
        process_internal_events(&mut ui, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, model, &ui)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(model, &mut ui, runtime, policy, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(ui: &mut UiState, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == ui.status_token => {
                ui.status_line = None;
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(ui: &mut UiState, internal_tx: &Sender<InternalEvent>, message: impl Into<String>) {
    ui.status_line = Some(message.into());
    ui.status_token = ui.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, ui.status_token);
}

// Fetch the collection and rebuild the table from it. Transport failures go
// to the log and leave the previous rows in place.
pub fn reload_table<R: AppRuntime>(model: &mut TableModel, runtime: &mut R) -> String {
    match runtime.list_products() {
        Ok(products) => {
            let count = products.len();
            model.dispatch(TableCommand::Render(products));
            format!("loaded {count} products")
        }
        Err(error) => {
            tracing::warn!("list products failed: {error:#}");
            "load failed; check the remote endpoint and the log".to_owned()
        }
    }
}

// Parse and validate the row's draft, then push the full record to the store
// keyed by the row's original id. Validation failures keep the row editing
// without touching the network; transport failures park it in SaveFailed
// with the draft intact so the save can be retried.
pub fn submit_save<R: AppRuntime>(
    model: &mut TableModel,
    runtime: &mut R,
    policy: WritePolicy,
    key: ProductId,
) -> String {
    let Some(row) = model.row(key) else {
        return format!("product {} is gone", key.get());
    };
    let product = match row.prepare_save() {
        Ok(product) => product,
        Err(error) => return format!("invalid input: {error:#}"),
    };

    match runtime.update_product(key, &product) {
        Ok(()) => {
            model.dispatch(TableCommand::CommitSaved(key, product));
            match apply_post_write(model, runtime, policy.after_update, Some(key)) {
                Some(note) => format!("saved product {}; {note}", key.get()),
                None => format!("saved product {}", key.get()),
            }
        }
        Err(error) => {
            tracing::warn!("update product {} failed: {error:#}", key.get());
            model.dispatch(TableCommand::MarkSaveFailed(key));
            format!(
                "save failed for product {}; press s to retry or esc to discard",
                key.get()
            )
        }
    }
}

pub fn submit_delete<R: AppRuntime>(
    model: &mut TableModel,
    runtime: &mut R,
    policy: WritePolicy,
    key: ProductId,
) -> String {
    match runtime.delete_product(key) {
        Ok(()) => match apply_post_write(model, runtime, policy.after_delete, Some(key)) {
            Some(note) => format!("deleted product {}; {note}", key.get()),
            None => format!("deleted product {}", key.get()),
        },
        Err(error) => {
            tracing::warn!("delete product {} failed: {error:#}", key.get());
            format!("delete failed for product {}", key.get())
        }
    }
}

pub fn submit_create<R: AppRuntime>(
    model: &mut TableModel,
    runtime: &mut R,
    policy: WritePolicy,
    form: &mut ProductFormInput,
) -> String {
    let product = match form.parse() {
        Ok(product) => product,
        Err(error) => return format!("invalid input: {error:#}"),
    };

    let id = product.id.get();
    match runtime.create_product(&product) {
        Ok(()) => {
            form.reset();
            match apply_post_write(model, runtime, policy.after_create, None) {
                Some(note) => format!("created product {id}; {note}"),
                None => format!("created product {id}"),
            }
        }
        Err(error) => {
            tracing::warn!("create product {id} failed: {error:#}");
            "create failed; form kept for retry".to_owned()
        }
    }
}

fn apply_post_write<R: AppRuntime>(
    model: &mut TableModel,
    runtime: &mut R,
    action: PostWriteAction,
    key: Option<ProductId>,
) -> Option<String> {
    match action {
        PostWriteAction::Reload => match runtime.list_products() {
            Ok(products) => {
                model.dispatch(TableCommand::Render(products));
                None
            }
            Err(error) => {
                tracing::warn!("reload after write failed: {error:#}");
                Some("reload failed; table may be stale".to_owned())
            }
        },
        PostWriteAction::RemoveRow => {
            if let Some(key) = key {
                model.dispatch(TableCommand::RemoveRow(key));
            }
            None
        }
        PostWriteAction::Keep => None,
    }
}

fn selected_key(model: &TableModel, ui: &UiState) -> Option<ProductId> {
    model.visible_rows().nth(ui.cursor).map(|row| row.key())
}

fn clamp_cursor(model: &TableModel, ui: &mut UiState) {
    ui.cursor = ui.cursor.min(model.visible_count().saturating_sub(1));
}

fn move_cursor(model: &TableModel, ui: &mut UiState, delta: isize) {
    let count = model.visible_count();
    if count == 0 {
        ui.cursor = 0;
        return;
    }
    let next = ui.cursor as isize + delta;
    ui.cursor = next.clamp(0, count as isize - 1) as usize;
}

fn handle_key_event<R: AppRuntime>(
    model: &mut TableModel,
    ui: &mut UiState,
    runtime: &mut R,
    policy: WritePolicy,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    // Delete stays available in every mode, an open edit included.
    if key.code == KeyCode::Char('d') && key.modifiers.contains(KeyModifiers::CONTROL) {
        if let Some(selected) = selected_key(model, ui) {
            let status = submit_delete(model, runtime, policy, selected);
            clamp_cursor(model, ui);
            emit_status(ui, internal_tx, status);
        }
        return false;
    }

    if ui.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            ui.help_visible = false;
        }
        return false;
    }

    match ui.pane {
        Pane::Table => handle_table_key(model, ui, runtime, policy, internal_tx, key),
        Pane::Form => handle_form_key(model, ui, runtime, policy, internal_tx, key),
        Pane::FilterStatus | Pane::FilterId => handle_filter_key(model, ui, internal_tx, key),
    }
    false
}

fn handle_table_key<R: AppRuntime>(
    model: &mut TableModel,
    ui: &mut UiState,
    runtime: &mut R,
    policy: WritePolicy,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let selected = selected_key(model, ui);
    let editing = selected
        .and_then(|key| model.row(key))
        .is_some_and(|row| row.mode() == RowMode::Editing);
    if editing {
        let Some(selected) = selected else {
            return;
        };
        handle_cell_edit_key(model, ui, runtime, policy, internal_tx, selected, key);
        return;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Tab, _) => ui.pane = ui.pane.next(),
        (KeyCode::BackTab, _) => ui.pane = ui.pane.prev(),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => move_cursor(model, ui, 1),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => move_cursor(model, ui, -1),
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => {
            ui.active_column = ui.active_column.prev();
        }
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => {
            ui.active_column = ui.active_column.next();
        }
        (KeyCode::Char('g'), _) => ui.cursor = 0,
        (KeyCode::Char('G'), _) => ui.cursor = model.visible_count().saturating_sub(1),
        (KeyCode::Char('e'), KeyModifiers::NONE) | (KeyCode::Enter, _) => {
            if let Some(selected) = selected {
                model.dispatch(TableCommand::BeginEdit(selected));
                emit_status(
                    ui,
                    internal_tx,
                    format!("editing product {}; enter saves, esc discards", selected.get()),
                );
            }
        }
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            // Retries a save parked in SaveFailed; a read-only row has no
            // draft and reports that instead.
            if let Some(selected) = selected {
                let status = submit_save(model, runtime, policy, selected);
                clamp_cursor(model, ui);
                emit_status(ui, internal_tx, status);
            }
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            if let Some(selected) = selected {
                let status = submit_delete(model, runtime, policy, selected);
                clamp_cursor(model, ui);
                emit_status(ui, internal_tx, status);
            }
        }
        (KeyCode::Esc, _) => {
            if let Some(selected) = selected
                && !model.dispatch(TableCommand::CancelEdit(selected)).is_empty()
            {
                emit_status(ui, internal_tx, "edit discarded");
            }
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            let status = reload_table(model, runtime);
            clamp_cursor(model, ui);
            emit_status(ui, internal_tx, status);
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => ui.pane = Pane::Form,
        (KeyCode::Char('/'), _) => ui.pane = Pane::FilterStatus,
        (KeyCode::Char('?'), _) => ui.help_visible = true,
        _ => {}
    }
}

fn handle_cell_edit_key<R: AppRuntime>(
    model: &mut TableModel,
    ui: &mut UiState,
    runtime: &mut R,
    policy: WritePolicy,
    internal_tx: &Sender<InternalEvent>,
    selected: ProductId,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            model.dispatch(TableCommand::CancelEdit(selected));
            emit_status(ui, internal_tx, "edit discarded");
        }
        (KeyCode::Enter, _) => {
            let status = submit_save(model, runtime, policy, selected);
            clamp_cursor(model, ui);
            emit_status(ui, internal_tx, status);
        }
        (KeyCode::Tab, _) | (KeyCode::Right, _) => ui.active_column = ui.active_column.next(),
        (KeyCode::BackTab, _) | (KeyCode::Left, _) => ui.active_column = ui.active_column.prev(),
        (KeyCode::Backspace, _) => {
            edit_active_cell(model, ui, selected, |text| {
                text.pop();
            });
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            edit_active_cell(model, ui, selected, |text| text.push(ch));
        }
        _ => {}
    }
}

fn edit_active_cell(
    model: &mut TableModel,
    ui: &UiState,
    selected: ProductId,
    edit: impl FnOnce(&mut String),
) {
    let Some(row) = model.row(selected) else {
        return;
    };
    let mut text = row.cell_text(ui.active_column);
    edit(&mut text);
    model.dispatch(TableCommand::SetCell(selected, ui.active_column, text));
}

fn handle_form_key<R: AppRuntime>(
    model: &mut TableModel,
    ui: &mut UiState,
    runtime: &mut R,
    policy: WritePolicy,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => ui.pane = Pane::Table,
        (KeyCode::Enter, _) => {
            let status = submit_create(model, runtime, policy, &mut ui.form);
            clamp_cursor(model, ui);
            emit_status(ui, internal_tx, status);
        }
        (KeyCode::Tab, _) | (KeyCode::Down, _) => ui.form_field = ui.form_field.next(),
        (KeyCode::BackTab, _) | (KeyCode::Up, _) => ui.form_field = ui.form_field.prev(),
        (KeyCode::Backspace, _) => {
            ui.form.text_mut(ui.form_field).pop();
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            ui.form.text_mut(ui.form_field).push(ch);
        }
        _ => {}
    }
}

fn handle_filter_key(
    model: &mut TableModel,
    ui: &mut UiState,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Enter, _) => ui.pane = Pane::Table,
        (KeyCode::Tab, _) => ui.pane = ui.pane.next(),
        (KeyCode::BackTab, _) => ui.pane = ui.pane.prev(),
        (KeyCode::Backspace, _) => {
            edit_filter_term(model, ui, internal_tx, |term| {
                term.pop();
            });
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            edit_filter_term(model, ui, internal_tx, |term| term.push(ch));
        }
        _ => {}
    }
}

fn edit_filter_term(
    model: &mut TableModel,
    ui: &mut UiState,
    internal_tx: &Sender<InternalEvent>,
    edit: impl FnOnce(&mut String),
) {
    let mut terms = model.filter().clone();
    let term = match ui.pane {
        Pane::FilterStatus => &mut terms.status,
        Pane::FilterId => &mut terms.id,
        Pane::Table | Pane::Form => return,
    };
    edit(term);
    model.dispatch(TableCommand::SetFilter(terms));
    clamp_cursor(model, ui);
    let visible = model.visible_count();
    emit_status(ui, internal_tx, format!("{visible} rows match"));
}

fn render(frame: &mut ratatui::Frame<'_>, model: &TableModel, ui: &UiState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let filters = Paragraph::new(filters_text(model, ui))
        .block(Block::default().title("filters").borders(Borders::ALL));
    frame.render_widget(filters, layout[0]);

    render_table(frame, layout[1], model, ui);

    let form = Paragraph::new(form_text(ui))
        .block(Block::default().title("new product").borders(Borders::ALL));
    frame.render_widget(form, layout[2]);

    let status = Paragraph::new(status_text(ui))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[3]);

    if ui.help_visible {
        let area = centered_rect(78, 64, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, model: &TableModel, ui: &UiState) {
    let header_cells = Column::ALL
        .iter()
        .map(|column| column.label())
        .chain([STATE_COLUMN_LABEL])
        .map(|label| {
            Cell::from(label).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        });
    let header = Row::new(header_cells);

    let rows = model.visible_rows().enumerate().map(|(index, row)| {
        let selected = ui.pane == Pane::Table && index == ui.cursor;
        let cells = Column::ALL
            .iter()
            .map(|column| {
                let mut style = Style::default();
                if selected {
                    style = style.bg(Color::DarkGray);
                }
                if selected && *column == ui.active_column {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(row.cell_text(*column)).style(style)
            })
            .chain([
                Cell::from(mode_marker(row.mode())).style(mode_marker_style(row.mode())),
            ])
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let widths = vec![Constraint::Min(8); Column::ALL.len() + 1];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(model))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn table_title(model: &TableModel) -> String {
    let total = model.rows().len();
    let visible = model.visible_count();
    if visible == total {
        format!("products ({total})")
    } else {
        format!("products ({visible}/{total})")
    }
}

const fn mode_marker(mode: RowMode) -> &'static str {
    match mode {
        RowMode::ReadOnly => "",
        RowMode::Editing => "edit",
        RowMode::SaveFailed => "save failed",
    }
}

fn mode_marker_style(mode: RowMode) -> Style {
    match mode {
        RowMode::ReadOnly => Style::default(),
        RowMode::Editing => Style::default().fg(Color::Yellow),
        RowMode::SaveFailed => Style::default().fg(Color::Red),
    }
}

fn filters_text(model: &TableModel, ui: &UiState) -> String {
    let terms = model.filter();
    let status_mark = if ui.pane == Pane::FilterStatus {
        FOCUS_MARK
    } else {
        " "
    };
    let id_mark = if ui.pane == Pane::FilterId {
        FOCUS_MARK
    } else {
        " "
    };
    format!(
        "{status_mark} status: {:<24} {id_mark} id: {:<12}",
        terms.status, terms.id
    )
}

fn form_text(ui: &UiState) -> String {
    Column::ALL
        .iter()
        .map(|column| {
            let mark = if ui.pane == Pane::Form && ui.form_field == *column {
                FOCUS_MARK
            } else {
                " "
            };
            format!("{mark}{}: {}", column.label(), ui.form.text(*column))
        })
        .collect::<Vec<String>>()
        .join("  ")
}

fn status_text(ui: &UiState) -> String {
    let pane = ui.pane.label();
    let default = "tab pane | j/k h/l | e edit | s save | d del | a add | r reload | / filter | ? help | ctrl+q quit";
    match &ui.status_line {
        Some(status) => format!("{pane} | {status} | {default}"),
        None => format!("{pane} | {default}"),
    }
}

fn help_overlay_text() -> &'static str {
    "table: j/k move row | h/l move column | g/G first/last | e or enter edit | d delete | r reload\n\
table: s save or retry a failed save | esc discard a kept draft | a new product | / filters | tab cycle pane\n\
edit: type into the cell | tab/arrows move column | enter save | esc discard | ctrl+d delete row\n\
form: tab/shift+tab field | enter submit | esc back to table\n\
filters: type to narrow | backspace erase | enter or esc back to table\n\
global: ctrl+q quit | ? help"
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

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, Pane, UiState, filters_text, form_text, handle_key_event,
        help_overlay_text, reload_table, selected_key, status_text, submit_create, submit_delete,
        submit_save, table_title,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use shopkeep_app::{
        Column, PostWriteAction, Product, ProductFormInput, ProductId, RowMode, TableCommand,
        TableModel, WritePolicy,
    };
    use std::sync::mpsc;

    fn product(id: i64, external_id: i64, rating: i64, status: &str) -> Product {
        Product {
            id: ProductId::new(id),
            external_id,
            rating,
            status: status.to_owned(),
        }
    }

    // Backs the runtime seam with an in-memory collection and records every
    // call so tests can assert on exact operation counts.
    #[derive(Debug, Default)]
    struct RecordingRuntime {
        products: Vec<Product>,
        list_calls: usize,
        created: Vec<Product>,
        updated: Vec<(ProductId, Product)>,
        deleted: Vec<ProductId>,
        fail_list: bool,
        fail_create: bool,
        fail_update: bool,
        fail_delete: bool,
    }

    impl RecordingRuntime {
        fn seeded(products: Vec<Product>) -> Self {
            Self {
                products,
                ..Self::default()
            }
        }

        fn write_calls(&self) -> usize {
            self.created.len() + self.updated.len() + self.deleted.len()
        }
    }

    impl AppRuntime for RecordingRuntime {
        fn list_products(&mut self) -> Result<Vec<Product>> {
            self.list_calls += 1;
            if self.fail_list {
                bail!("connection refused");
            }
            Ok(self.products.clone())
        }

        fn create_product(&mut self, product: &Product) -> Result<()> {
            if self.fail_create {
                bail!("connection refused");
            }
            self.created.push(product.clone());
            self.products.push(product.clone());
            Ok(())
        }

        fn update_product(&mut self, id: ProductId, product: &Product) -> Result<()> {
            if self.fail_update {
                bail!("connection refused");
            }
            self.updated.push((id, product.clone()));
            if let Some(entry) = self.products.iter_mut().find(|entry| entry.id == id) {
                *entry = product.clone();
            }
            Ok(())
        }

        fn delete_product(&mut self, id: ProductId) -> Result<()> {
            if self.fail_delete {
                bail!("connection refused");
            }
            self.deleted.push(id);
            self.products.retain(|entry| entry.id != id);
            Ok(())
        }
    }

    fn rendered_model(products: Vec<Product>) -> TableModel {
        let mut model = TableModel::new();
        model.dispatch(TableCommand::Render(products));
        model
    }

    fn internal_tx() -> mpsc::Sender<InternalEvent> {
        let (tx, _rx) = mpsc::channel();
        tx
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn run_keys(
        model: &mut TableModel,
        ui: &mut UiState,
        runtime: &mut RecordingRuntime,
        keys: &[KeyEvent],
    ) -> bool {
        let tx = internal_tx();
        let mut quit = false;
        for key in keys {
            quit = handle_key_event(model, ui, runtime, WritePolicy::default(), &tx, *key);
        }
        quit
    }

    fn type_text(model: &mut TableModel, ui: &mut UiState, runtime: &mut RecordingRuntime, text: &str) {
        let keys: Vec<KeyEvent> = text.chars().map(|ch| key(KeyCode::Char(ch))).collect();
        run_keys(model, ui, runtime, &keys);
    }

    fn row_ids(model: &TableModel) -> Vec<i64> {
        model.rows().iter().map(|row| row.key().get()).collect()
    }

    #[test]
    fn reload_renders_the_collection_sorted_by_rating() {
        let mut model = TableModel::new();
        let mut runtime = RecordingRuntime::seeded(vec![
            product(1, 100, 3, "active"),
            product(2, 200, 1, "inactive"),
        ]);

        let status = reload_table(&mut model, &mut runtime);
        assert_eq!(status, "loaded 2 products");
        assert_eq!(row_ids(&model), vec![2, 1]);
        assert_eq!(runtime.list_calls, 1);
    }

    #[test]
    fn reload_failure_keeps_previous_rows() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut runtime = RecordingRuntime::default();
        runtime.fail_list = true;

        let status = reload_table(&mut model, &mut runtime);
        assert!(status.contains("load failed"));
        assert_eq!(row_ids(&model), vec![1]);
    }

    #[test]
    fn valid_save_issues_one_update_and_returns_the_row_to_read_only() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);
        model.dispatch(TableCommand::BeginEdit(ProductId::new(1)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(1),
            Column::Rating,
            "5".to_owned(),
        ));

        let status = submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(1),
        );
        assert!(status.starts_with("saved product 1"));
        assert_eq!(
            runtime.updated,
            vec![(ProductId::new(1), product(1, 100, 5, "active"))]
        );

        let row = model.row(ProductId::new(1)).expect("row present");
        assert_eq!(row.mode(), RowMode::ReadOnly);
        assert!(row.draft().is_none());
    }

    #[test]
    fn save_is_keyed_by_the_original_id_even_when_the_id_cell_was_edited() {
        let mut model = rendered_model(vec![product(5, 500, 3, "active")]);
        let mut runtime = RecordingRuntime::seeded(vec![product(5, 500, 3, "active")]);
        model.dispatch(TableCommand::BeginEdit(ProductId::new(5)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(5),
            Column::Id,
            "9".to_owned(),
        ));

        submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(5),
        );

        let (key, sent) = runtime.updated.first().expect("one update call").clone();
        assert_eq!(key, ProductId::new(5));
        assert_eq!(sent.id, ProductId::new(9));
    }

    #[test]
    fn invalid_rating_makes_no_network_call_and_stays_editing() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);
        model.dispatch(TableCommand::BeginEdit(ProductId::new(1)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(1),
            Column::Rating,
            "7".to_owned(),
        ));

        let status = submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(1),
        );
        assert!(status.contains("invalid input"));
        assert!(status.contains("between 1 and 5"));
        assert_eq!(runtime.write_calls(), 0);
        assert_eq!(runtime.list_calls, 0);

        let row = model.row(ProductId::new(1)).expect("row present");
        assert_eq!(row.mode(), RowMode::Editing);
        assert_eq!(row.cell_text(Column::Rating), "7");
    }

    #[test]
    fn unparseable_cell_is_a_validation_failure_not_a_network_call() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);
        model.dispatch(TableCommand::BeginEdit(ProductId::new(1)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(1),
            Column::ExternalId,
            "lots".to_owned(),
        ));

        let status = submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(1),
        );
        assert!(status.contains("whole number"));
        assert_eq!(runtime.write_calls(), 0);
        assert_eq!(
            model.row(ProductId::new(1)).expect("row present").mode(),
            RowMode::Editing
        );
    }

    #[test]
    fn transport_failure_parks_the_row_in_save_failed_with_the_draft_intact() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);
        runtime.fail_update = true;
        model.dispatch(TableCommand::BeginEdit(ProductId::new(1)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(1),
            Column::Status,
            "pending".to_owned(),
        ));

        let status = submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(1),
        );
        assert!(status.contains("save failed"));

        let row = model.row(ProductId::new(1)).expect("row present");
        assert_eq!(row.mode(), RowMode::SaveFailed);
        assert_eq!(row.cell_text(Column::Status), "pending");

        // The retry path reuses the kept draft.
        runtime.fail_update = false;
        let status = submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(1),
        );
        assert!(status.starts_with("saved product 1"));
        assert_eq!(
            runtime.updated,
            vec![(ProductId::new(1), product(1, 100, 3, "pending"))]
        );
        assert_eq!(
            model.row(ProductId::new(1)).expect("row present").mode(),
            RowMode::ReadOnly
        );
    }

    #[test]
    fn save_reloads_under_the_default_policy() {
        let mut model = rendered_model(vec![
            product(1, 100, 1, "first"),
            product(2, 200, 2, "second"),
        ]);
        let mut runtime = RecordingRuntime::seeded(vec![
            product(1, 100, 1, "first"),
            product(2, 200, 2, "second"),
        ]);
        model.dispatch(TableCommand::BeginEdit(ProductId::new(1)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(1),
            Column::Rating,
            "5".to_owned(),
        ));

        submit_save(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(1),
        );
        assert_eq!(runtime.list_calls, 1);
        // The reload re-sorts, so the bumped rating moves the row down.
        assert_eq!(row_ids(&model), vec![2, 1]);
    }

    #[test]
    fn save_with_keep_policy_leaves_the_row_in_its_stale_position() {
        let mut model = rendered_model(vec![
            product(1, 100, 1, "first"),
            product(2, 200, 2, "second"),
        ]);
        let mut runtime = RecordingRuntime::seeded(vec![
            product(1, 100, 1, "first"),
            product(2, 200, 2, "second"),
        ]);
        let policy = WritePolicy {
            after_update: PostWriteAction::Keep,
            ..WritePolicy::default()
        };
        model.dispatch(TableCommand::BeginEdit(ProductId::new(1)));
        model.dispatch(TableCommand::SetCell(
            ProductId::new(1),
            Column::Rating,
            "5".to_owned(),
        ));

        submit_save(&mut model, &mut runtime, policy, ProductId::new(1));
        assert_eq!(runtime.list_calls, 0);
        assert_eq!(row_ids(&model), vec![1, 2]);
    }

    #[test]
    fn delete_removes_exactly_that_row_without_a_reload() {
        let mut model = rendered_model(vec![
            product(5, 1, 1, "a"),
            product(6, 2, 2, "b"),
            product(7, 3, 3, "c"),
        ]);
        let mut runtime = RecordingRuntime::seeded(vec![
            product(5, 1, 1, "a"),
            product(6, 2, 2, "b"),
            product(7, 3, 3, "c"),
        ]);

        let status = submit_delete(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(5),
        );
        assert_eq!(status, "deleted product 5");
        assert_eq!(runtime.deleted, vec![ProductId::new(5)]);
        assert_eq!(runtime.list_calls, 0);
        assert_eq!(row_ids(&model), vec![6, 7]);
    }

    #[test]
    fn delete_failure_leaves_the_row_in_place() {
        let mut model = rendered_model(vec![product(5, 1, 1, "a")]);
        let mut runtime = RecordingRuntime::seeded(vec![product(5, 1, 1, "a")]);
        runtime.fail_delete = true;

        let status = submit_delete(
            &mut model,
            &mut runtime,
            WritePolicy::default(),
            ProductId::new(5),
        );
        assert!(status.contains("delete failed"));
        assert_eq!(row_ids(&model), vec![5]);
    }

    #[test]
    fn create_resets_the_form_and_reloads_under_the_default_policy() {
        let mut model = TableModel::new();
        let mut runtime = RecordingRuntime::default();
        let mut form = ProductFormInput {
            id: "3".to_owned(),
            external_id: "300".to_owned(),
            rating: "4".to_owned(),
            status: "active".to_owned(),
        };

        let status = submit_create(&mut model, &mut runtime, WritePolicy::default(), &mut form);
        assert_eq!(status, "created product 3");
        assert_eq!(runtime.created, vec![product(3, 300, 4, "active")]);
        assert_eq!(runtime.list_calls, 1);
        assert!(form.is_blank());
        assert_eq!(row_ids(&model), vec![3]);
    }

    #[test]
    fn create_with_out_of_range_rating_makes_no_call_and_keeps_the_form() {
        let mut model = TableModel::new();
        let mut runtime = RecordingRuntime::default();
        let mut form = ProductFormInput {
            id: "3".to_owned(),
            external_id: "300".to_owned(),
            rating: "0".to_owned(),
            status: "active".to_owned(),
        };

        let status = submit_create(&mut model, &mut runtime, WritePolicy::default(), &mut form);
        assert!(status.contains("invalid input"));
        assert_eq!(runtime.write_calls(), 0);
        assert_eq!(runtime.list_calls, 0);
        assert_eq!(form.rating, "0");
    }

    #[test]
    fn create_transport_failure_keeps_the_form_and_skips_the_reload() {
        let mut model = TableModel::new();
        let mut runtime = RecordingRuntime::default();
        runtime.fail_create = true;
        let mut form = ProductFormInput {
            id: "3".to_owned(),
            external_id: "300".to_owned(),
            rating: "4".to_owned(),
            status: "active".to_owned(),
        };

        let status = submit_create(&mut model, &mut runtime, WritePolicy::default(), &mut form);
        assert!(status.contains("create failed"));
        assert_eq!(runtime.list_calls, 0);
        assert_eq!(form.status, "active");
    }

    #[test]
    fn ctrl_q_quits_from_any_pane() {
        let mut model = TableModel::new();
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::default();

        assert!(run_keys(&mut model, &mut ui, &mut runtime, &[ctrl('q')]));
        ui.pane = Pane::FilterStatus;
        assert!(run_keys(&mut model, &mut ui, &mut runtime, &[ctrl('q')]));
    }

    #[test]
    fn edit_keys_type_into_the_active_cell() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);

        // e begins the edit, arrows reach the status column, typing appends.
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('e'))]);
        ui.active_column = Column::Status;
        type_text(&mut model, &mut ui, &mut runtime, "!!");

        let row = model.row(ProductId::new(1)).expect("row present");
        assert_eq!(row.mode(), RowMode::Editing);
        assert_eq!(row.cell_text(Column::Status), "active!!");

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Backspace)]);
        let row = model.row(ProductId::new(1)).expect("row present");
        assert_eq!(row.cell_text(Column::Status), "active!");
    }

    #[test]
    fn enter_saves_an_open_edit_and_esc_discards_one() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('e'))]);
        ui.active_column = Column::Rating;
        type_text(&mut model, &mut ui, &mut runtime, "5");
        // The rating cell now reads "35"; clear the old digit first.
        run_keys(
            &mut model,
            &mut ui,
            &mut runtime,
            &[key(KeyCode::Backspace), key(KeyCode::Backspace)],
        );
        type_text(&mut model, &mut ui, &mut runtime, "5");
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Enter)]);

        assert_eq!(
            runtime.updated,
            vec![(ProductId::new(1), product(1, 100, 5, "active"))]
        );

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('e'))]);
        ui.active_column = Column::Status;
        type_text(&mut model, &mut ui, &mut runtime, "x");
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Esc)]);

        let row = model.row(ProductId::new(1)).expect("row present");
        assert_eq!(row.mode(), RowMode::ReadOnly);
        assert_eq!(row.cell_text(Column::Status), "active");
    }

    #[test]
    fn ctrl_d_deletes_even_while_a_cell_edit_is_open() {
        let mut model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::seeded(vec![product(1, 100, 3, "active")]);

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('e'))]);
        run_keys(&mut model, &mut ui, &mut runtime, &[ctrl('d')]);

        assert_eq!(runtime.deleted, vec![ProductId::new(1)]);
        assert!(model.rows().is_empty());
    }

    #[test]
    fn filter_pane_typing_narrows_the_visible_rows() {
        let mut model = rendered_model(vec![
            product(1, 100, 3, "active"),
            product(2, 200, 1, "inactive"),
            product(3, 300, 2, "pending"),
        ]);
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::default();

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('/'))]);
        assert_eq!(ui.pane, Pane::FilterStatus);
        type_text(&mut model, &mut ui, &mut runtime, "act");

        // "act" matches both "active" and "inactive".
        let visible: Vec<i64> = model.visible_rows().map(|row| row.key().get()).collect();
        assert_eq!(visible, vec![2, 1]);

        run_keys(
            &mut model,
            &mut ui,
            &mut runtime,
            &[
                key(KeyCode::Backspace),
                key(KeyCode::Backspace),
                key(KeyCode::Backspace),
            ],
        );
        assert_eq!(model.visible_count(), 3);
    }

    #[test]
    fn id_filter_edits_through_its_own_pane() {
        let mut model = rendered_model(vec![
            product(12, 1, 1, "a"),
            product(21, 2, 2, "b"),
            product(3, 3, 3, "c"),
        ]);
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::default();

        run_keys(
            &mut model,
            &mut ui,
            &mut runtime,
            &[key(KeyCode::Char('/')), key(KeyCode::Tab)],
        );
        assert_eq!(ui.pane, Pane::FilterId);
        type_text(&mut model, &mut ui, &mut runtime, "2");

        let visible: Vec<i64> = model.visible_rows().map(|row| row.key().get()).collect();
        assert_eq!(visible, vec![12, 21]);

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Esc)]);
        assert_eq!(ui.pane, Pane::Table);
    }

    #[test]
    fn form_pane_collects_input_and_enter_submits() {
        let mut model = TableModel::new();
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::default();

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('a'))]);
        assert_eq!(ui.pane, Pane::Form);

        type_text(&mut model, &mut ui, &mut runtime, "7");
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Tab)]);
        type_text(&mut model, &mut ui, &mut runtime, "700");
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Tab)]);
        type_text(&mut model, &mut ui, &mut runtime, "4");
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Tab)]);
        type_text(&mut model, &mut ui, &mut runtime, "active");
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Enter)]);

        assert_eq!(runtime.created, vec![product(7, 700, 4, "active")]);
        assert!(ui.form.is_blank());
    }

    #[test]
    fn cursor_moves_over_visible_rows_and_clamps() {
        let mut model = rendered_model(vec![
            product(1, 1, 1, "a"),
            product(2, 2, 2, "b"),
            product(3, 3, 3, "c"),
        ]);
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::default();

        run_keys(
            &mut model,
            &mut ui,
            &mut runtime,
            &[
                key(KeyCode::Char('j')),
                key(KeyCode::Char('j')),
                key(KeyCode::Char('j')),
            ],
        );
        assert_eq!(ui.cursor, 2);
        assert_eq!(selected_key(&model, &ui), Some(ProductId::new(3)));

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('g'))]);
        assert_eq!(ui.cursor, 0);
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('G'))]);
        assert_eq!(ui.cursor, 2);
    }

    #[test]
    fn help_overlay_opens_and_closes() {
        let mut model = TableModel::new();
        let mut ui = UiState::default();
        let mut runtime = RecordingRuntime::default();

        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('?'))]);
        assert!(ui.help_visible);
        // Keys other than esc and ? are swallowed while help is up.
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Char('j'))]);
        assert!(ui.help_visible);
        run_keys(&mut model, &mut ui, &mut runtime, &[key(KeyCode::Esc)]);
        assert!(!ui.help_visible);
    }

    #[test]
    fn table_title_reports_filtered_counts() {
        let mut model = rendered_model(vec![
            product(1, 100, 3, "active"),
            product(2, 200, 1, "pending"),
        ]);
        assert_eq!(table_title(&model), "products (2)");

        model.dispatch(TableCommand::SetFilter(shopkeep_app::FilterTerms {
            status: "pend".to_owned(),
            id: String::new(),
        }));
        assert_eq!(table_title(&model), "products (1/2)");
    }

    #[test]
    fn chrome_text_marks_the_focused_pane_and_field() {
        let model = rendered_model(vec![product(1, 100, 3, "active")]);
        let mut ui = UiState::default();

        assert!(!filters_text(&model, &ui).contains('▼'));
        ui.pane = Pane::FilterStatus;
        assert!(filters_text(&model, &ui).contains('▼'));

        ui.pane = Pane::Form;
        ui.form_field = Column::Rating;
        assert!(form_text(&ui).contains("▼rating:"));

        ui.status_line = Some("saved product 1".to_owned());
        let status = status_text(&ui);
        assert!(status.starts_with("new product | saved product 1 |"));
    }

    #[test]
    fn help_text_covers_the_core_actions() {
        let help = help_overlay_text();
        for needle in ["edit", "delete", "filters", "enter save", "ctrl+q quit"] {
            assert!(help.contains(needle), "missing {needle}");
        }
    }
}
