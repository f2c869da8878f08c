// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};

use crate::ids::ProductId;
use crate::model::{Column, Product, validate_rating};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFormInput {
    pub id: String,
    pub external_id: String,
    pub rating: String,
    pub status: String,
}

impl ProductFormInput {
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

    pub fn is_blank(&self) -> bool {
        self.id.is_empty()
            && self.external_id.is_empty()
            && self.rating.is_empty()
            && self.status.is_empty()
    }

    pub fn parse(&self) -> Result<Product> {
        parse_product_fields(&self.id, &self.external_id, &self.rating, &self.status)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub fn parse_product_fields(
    id: &str,
    external_id: &str,
    rating: &str,
    status: &str,
) -> Result<Product> {
    let id = parse_integer_field("id", id)?;
    let external_id = parse_integer_field("ID", external_id)?;
    let rating = parse_integer_field("rating", rating)?;
    validate_rating(rating)?;
    Ok(Product {
        id: ProductId::new(id),
        external_id,
        rating,
        status: status.to_owned(),
    })
}

fn parse_integer_field(label: &str, raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("{label} is required -- enter a whole number and retry");
    }
    trimmed
        .parse()
        .map_err(|_| anyhow!("{label} must be a whole number, got {raw:?}"))
}
