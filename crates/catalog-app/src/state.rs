// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    DEFAULT_ROWS_PER_PAGE, ItemFields, ItemForm, ItemId, ItemRecord, ROWS_PER_PAGE_OPTIONS,
    SUCCESS_TOAST_LIFE, Toast,
};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Idle,
    /// Form dialog open; `target` is `None` for a new product.
    Editing { target: Option<ItemId> },
    ConfirmingDelete(ItemRecord),
}

/// Store call the front end must perform on behalf of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    Create(ItemFields),
    Update { id: ItemId, fields: ItemFields },
    Delete(ItemId),
}

impl MutationRequest {
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Create(_) => MutationKind::Create,
            Self::Update { .. } => MutationKind::Update,
            Self::Delete(_) => MutationKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub const fn success_detail(self) -> &'static str {
        match self {
            Self::Create => "Product created!",
            Self::Update => "Product updated!",
            Self::Delete => "Product deleted!",
        }
    }

    pub const fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub dialog: DialogState,
    pub form: ItemForm,
    pub items: Vec<ItemRecord>,
    pub filter: String,
    pub rows_per_page: usize,
    pub in_flight: Option<MutationKind>,
    pub toast: Option<Toast>,
    pub success_toast_life: Duration,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dialog: DialogState::Idle,
            form: ItemForm::new(),
            items: Vec::new(),
            filter: String::new(),
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            in_flight: None,
            toast: None,
            success_toast_life: SUCCESS_TOAST_LIFE,
            status_line: None,
        }
    }
}

impl AppState {
    /// State seeded from user settings. Unsupported page sizes fall back to
    /// the default.
    pub fn with_settings(rows_per_page: usize, success_toast_life: Duration) -> Self {
        let rows_per_page = if ROWS_PER_PAGE_OPTIONS.contains(&rows_per_page) {
            rows_per_page
        } else {
            DEFAULT_ROWS_PER_PAGE
        };
        Self {
            rows_per_page,
            success_toast_life,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    OpenNew,
    Edit(ItemRecord),
    HideDialog,
    Save,
    RequestDelete(ItemRecord),
    ConfirmDelete,
    CancelDelete,
    ReplaceItems(Vec<ItemRecord>),
    MutationSettled {
        kind: MutationKind,
        outcome: Result<(), String>,
    },
    SetFilter(String),
    CycleRowsPerPage,
    DismissToast,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    DialogChanged(DialogState),
    FormReset,
    ValidationFailed(String),
    MutationRequested(MutationRequest),
    MutationBusy,
    ItemsReplaced(usize),
    FilterChanged(String),
    RowsPerPageChanged(usize),
    ToastShown(Toast),
    ToastDismissed,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::OpenNew => {
                self.form.reset();
                self.set_dialog(DialogState::Editing { target: None })
            }
            AppCommand::Edit(record) => {
                self.form.populate(&record);
                self.set_dialog(DialogState::Editing { target: record.id })
            }
            AppCommand::HideDialog => match self.dialog {
                DialogState::Editing { .. } => self.set_dialog(DialogState::Idle),
                _ => Vec::new(),
            },
            AppCommand::Save => self.save(),
            AppCommand::RequestDelete(record) => {
                self.set_dialog(DialogState::ConfirmingDelete(record))
            }
            AppCommand::ConfirmDelete => self.confirm_delete(),
            AppCommand::CancelDelete => match self.dialog {
                DialogState::ConfirmingDelete(_) => self.set_dialog(DialogState::Idle),
                _ => Vec::new(),
            },
            AppCommand::ReplaceItems(items) => {
                self.items = items;
                vec![AppEvent::ItemsReplaced(self.items.len())]
            }
            AppCommand::MutationSettled { kind, outcome } => self.settle(kind, outcome),
            AppCommand::SetFilter(filter) => {
                self.filter = filter;
                vec![AppEvent::FilterChanged(self.filter.clone())]
            }
            AppCommand::CycleRowsPerPage => {
                let current = ROWS_PER_PAGE_OPTIONS
                    .iter()
                    .position(|rows| *rows == self.rows_per_page)
                    .unwrap_or(0);
                self.rows_per_page =
                    ROWS_PER_PAGE_OPTIONS[(current + 1) % ROWS_PER_PAGE_OPTIONS.len()];
                vec![AppEvent::RowsPerPageChanged(self.rows_per_page)]
            }
            AppCommand::DismissToast => {
                if self.toast.take().is_some() {
                    vec![AppEvent::ToastDismissed]
                } else {
                    Vec::new()
                }
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn visible_items(&self) -> Vec<&ItemRecord> {
        self.items
            .iter()
            .filter(|record| record.matches_filter(&self.filter))
            .collect()
    }

    fn save(&mut self) -> Vec<AppEvent> {
        let target = match &self.dialog {
            DialogState::Editing { target } => target.clone(),
            _ => return Vec::new(),
        };
        if self.in_flight.is_some() {
            return vec![AppEvent::MutationBusy];
        }
        let fields = match self.form.validate() {
            Ok(fields) => fields,
            Err(error) => {
                let message = error.to_string();
                return vec![
                    AppEvent::ValidationFailed(message.clone()),
                    self.set_status(&message),
                ];
            }
        };

        let request = match target {
            None => MutationRequest::Create(fields),
            Some(id) => MutationRequest::Update { id, fields },
        };
        self.in_flight = Some(request.kind());
        vec![AppEvent::MutationRequested(request)]
    }

    fn confirm_delete(&mut self) -> Vec<AppEvent> {
        let DialogState::ConfirmingDelete(target) = &self.dialog else {
            return Vec::new();
        };
        let Some(id) = target.id.clone() else {
            return Vec::new();
        };
        if self.in_flight.is_some() {
            return vec![AppEvent::MutationBusy];
        }
        self.in_flight = Some(MutationKind::Delete);
        vec![AppEvent::MutationRequested(MutationRequest::Delete(id))]
    }

    fn settle(&mut self, kind: MutationKind, outcome: Result<(), String>) -> Vec<AppEvent> {
        if self.in_flight == Some(kind) {
            self.in_flight = None;
        }

        match outcome {
            Ok(()) => {
                let mut events = Vec::new();
                match kind {
                    MutationKind::Create | MutationKind::Update => {
                        if matches!(self.dialog, DialogState::Editing { .. }) {
                            events.extend(self.set_dialog(DialogState::Idle));
                        }
                        self.form.reset();
                        events.push(AppEvent::FormReset);
                    }
                    MutationKind::Delete => {
                        if matches!(self.dialog, DialogState::ConfirmingDelete(_)) {
                            events.extend(self.set_dialog(DialogState::Idle));
                        }
                    }
                }
                let mut toast = Toast::success(kind.success_detail());
                toast.life = self.success_toast_life;
                events.push(self.show_toast(toast));
                events
            }
            Err(error) => {
                vec![self.show_toast(Toast::error(format!(
                    "could not {} product: {error}",
                    kind.verb()
                )))]
            }
        }
    }

    fn set_dialog(&mut self, dialog: DialogState) -> Vec<AppEvent> {
        self.dialog = dialog;
        vec![AppEvent::DialogChanged(self.dialog.clone())]
    }

    fn show_toast(&mut self, toast: Toast) -> AppEvent {
        self.toast = Some(toast.clone());
        AppEvent::ToastShown(toast)
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
