// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::ids::ProductId;

pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

// Wire field names are fixed and case-sensitive; `id` and `ID` are distinct
// fields on the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(rename = "ID")]
    pub external_id: i64,
    #[serde(rename = "Rating")]
    pub rating: i64,
    pub status: String,
}

impl Product {
    pub fn field_text(&self, column: Column) -> String {
        match column {
            Column::Id => self.id.get().to_string(),
            Column::ExternalId => self.external_id.to_string(),
            Column::Rating => self.rating.to_string(),
            Column::Status => self.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Id,
    ExternalId,
    Rating,
    Status,
}

impl Column {
    pub const ALL: [Self; 4] = [Self::Id, Self::ExternalId, Self::Rating, Self::Status];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ExternalId => "ID",
            Self::Rating => "rating",
            Self::Status => "status",
        }
    }

    pub fn next(self) -> Self {
        self.rotate(1)
    }

    pub fn prev(self) -> Self {
        self.rotate(-1)
    }

    fn rotate(self, delta: isize) -> Self {
        let columns = Self::ALL;
        let current = columns
            .iter()
            .position(|column| *column == self)
            .unwrap_or(0) as isize;
        let len = columns.len() as isize;
        columns[(current + delta).rem_euclid(len) as usize]
    }
}

pub const fn rating_in_range(rating: i64) -> bool {
    RATING_MIN <= rating && rating <= RATING_MAX
}

pub fn validate_rating(rating: i64) -> Result<()> {
    if !rating_in_range(rating) {
        bail!("rating must be between {RATING_MIN} and {RATING_MAX}, got {rating}");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostWriteAction {
    Reload,
    RemoveRow,
    Keep,
}

impl PostWriteAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::RemoveRow => "remove-row",
            Self::Keep => "keep",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reload" => Some(Self::Reload),
            "remove-row" => Some(Self::RemoveRow),
            "keep" => Some(Self::Keep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePolicy {
    pub after_create: PostWriteAction,
    pub after_update: PostWriteAction,
    pub after_delete: PostWriteAction,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            after_create: PostWriteAction::Reload,
            after_update: PostWriteAction::Reload,
            after_delete: PostWriteAction::RemoveRow,
        }
    }
}
