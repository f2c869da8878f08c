// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::forms::parse_product_fields;
use crate::ids::ProductId;
use crate::model::{Column, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    ReadOnly,
    Editing,
    SaveFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDraft {
    pub id: String,
    pub external_id: String,
    pub rating: String,
    pub status: String,
}

impl RowDraft {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.get().to_string(),
            external_id: product.external_id.to_string(),
            rating: product.rating.to_string(),
            status: product.status.clone(),
        }
    }

    pub fn text(&self, column: Column) -> &str {
        match column {
            Column::Id => &self.id,
            Column::ExternalId => &self.external_id,
            Column::Rating => &self.rating,
            Column::Status => &self.status,
        }
    }

    pub fn text_mut(&mut self, column: Column) -> &mut String {
        match column {
            Column::Id => &mut self.id,
            Column::ExternalId => &mut self.external_id,
            Column::Rating => &mut self.rating,
            Column::Status => &mut self.status,
        }
    }
}

// The addressing key is captured when the row is built and never follows the
// editable id cell, so update/delete always target the record the row was
// rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    key: ProductId,
    product: Product,
    mode: RowMode,
    draft: Option<RowDraft>,
    visible: bool,
}

impl RowView {
    fn new(product: Product) -> Self {
        Self {
            key: product.id,
            product,
            mode: RowMode::ReadOnly,
            draft: None,
            visible: true,
        }
    }

    pub fn key(&self) -> ProductId {
        self.key
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn mode(&self) -> RowMode {
        self.mode
    }

    pub fn draft(&self) -> Option<&RowDraft> {
        self.draft.as_ref()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn cell_text(&self, column: Column) -> String {
        match &self.draft {
            Some(draft) => draft.text(column).to_owned(),
            None => self.product.field_text(column),
        }
    }

    pub fn prepare_save(&self) -> Result<Product> {
        let Some(draft) = &self.draft else {
            bail!("no draft open for product {}", self.key.get());
        };
        parse_product_fields(&draft.id, &draft.external_id, &draft.rating, &draft.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterTerms {
    pub status: String,
    pub id: String,
}

impl FilterTerms {
    pub fn is_empty(&self) -> bool {
        self.status.is_empty() && self.id.is_empty()
    }

    // Status matches case-insensitively; the id term is numeric text and
    // matches as a case-sensitive substring. Empty terms match everything.
    pub fn matches(&self, status_text: &str, id_text: &str) -> bool {
        status_text
            .to_lowercase()
            .contains(&self.status.to_lowercase())
            && id_text.contains(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCommand {
    Render(Vec<Product>),
    BeginEdit(ProductId),
    SetCell(ProductId, Column, String),
    CancelEdit(ProductId),
    CommitSaved(ProductId, Product),
    MarkSaveFailed(ProductId),
    RemoveRow(ProductId),
    SetFilter(FilterTerms),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    Rendered { rows: usize },
    EditStarted(ProductId),
    CellChanged(ProductId, Column),
    EditCanceled(ProductId),
    Saved(ProductId),
    SaveFailed(ProductId),
    RowRemoved(ProductId),
    FilterApplied { visible: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableModel {
    rows: Vec<RowView>,
    filter: FilterTerms,
}

impl TableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[RowView] {
        &self.rows
    }

    pub fn row(&self, key: ProductId) -> Option<&RowView> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &RowView> {
        self.rows.iter().filter(|row| row.visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_rows().count()
    }

    pub fn filter(&self) -> &FilterTerms {
        &self.filter
    }

    pub fn dispatch(&mut self, command: TableCommand) -> Vec<TableEvent> {
        match command {
            TableCommand::Render(mut products) => {
                // Stable sort: rating ties keep fetch order.
                products.sort_by_key(|product| product.rating);
                self.rows = products.into_iter().map(RowView::new).collect();
                self.apply_filter();
                vec![TableEvent::Rendered {
                    rows: self.rows.len(),
                }]
            }
            TableCommand::BeginEdit(key) => {
                let Some(row) = self.row_mut(key) else {
                    return Vec::new();
                };
                match row.mode {
                    RowMode::Editing => Vec::new(),
                    RowMode::ReadOnly => {
                        row.draft = Some(RowDraft::from_product(&row.product));
                        row.mode = RowMode::Editing;
                        vec![TableEvent::EditStarted(key)]
                    }
                    RowMode::SaveFailed => {
                        if row.draft.is_none() {
                            row.draft = Some(RowDraft::from_product(&row.product));
                        }
                        row.mode = RowMode::Editing;
                        vec![TableEvent::EditStarted(key)]
                    }
                }
            }
            TableCommand::SetCell(key, column, text) => {
                let Some(row) = self.row_mut(key) else {
                    return Vec::new();
                };
                let Some(draft) = row.draft.as_mut() else {
                    return Vec::new();
                };
                *draft.text_mut(column) = text;
                vec![TableEvent::CellChanged(key, column)]
            }
            TableCommand::CancelEdit(key) => {
                let Some(row) = self.row_mut(key) else {
                    return Vec::new();
                };
                if row.mode == RowMode::ReadOnly {
                    return Vec::new();
                }
                row.draft = None;
                row.mode = RowMode::ReadOnly;
                vec![TableEvent::EditCanceled(key)]
            }
            TableCommand::CommitSaved(key, product) => {
                let Some(row) = self.row_mut(key) else {
                    return Vec::new();
                };
                row.product = product;
                row.draft = None;
                row.mode = RowMode::ReadOnly;
                vec![TableEvent::Saved(key)]
            }
            TableCommand::MarkSaveFailed(key) => {
                let Some(row) = self.row_mut(key) else {
                    return Vec::new();
                };
                if row.draft.is_none() {
                    return Vec::new();
                }
                row.mode = RowMode::SaveFailed;
                vec![TableEvent::SaveFailed(key)]
            }
            TableCommand::RemoveRow(key) => {
                let before = self.rows.len();
                self.rows.retain(|row| row.key != key);
                if self.rows.len() == before {
                    return Vec::new();
                }
                vec![TableEvent::RowRemoved(key)]
            }
            TableCommand::SetFilter(terms) => {
                self.filter = terms;
                self.apply_filter();
                vec![TableEvent::FilterApplied {
                    visible: self.visible_count(),
                }]
            }
        }
    }

    fn row_mut(&mut self, key: ProductId) -> Option<&mut RowView> {
        self.rows.iter_mut().find(|row| row.key == key)
    }

    // Visibility reads rendered cell text, so an open draft participates in
    // matching. Recomputed on render and on term changes only.
    fn apply_filter(&mut self) {
        let filter = self.filter.clone();
        for row in &mut self.rows {
            row.visible = filter.matches(
                &row.cell_text(Column::Status),
                &row.cell_text(Column::Id),
            );
        }
    }
}
