// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use shopkeep_api::Client;
use shopkeep_app::{Product, ProductId};

// Backs the UI runtime seam with the blocking HTTP client. Transport errors
// pass through unchanged; the controllers decide how to surface them.
pub struct HttpRuntime {
    client: Client,
}

impl HttpRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl shopkeep_tui::AppRuntime for HttpRuntime {
    fn list_products(&mut self) -> Result<Vec<Product>> {
        Ok(self.client.list()?)
    }

    fn create_product(&mut self, product: &Product) -> Result<()> {
        Ok(self.client.create(product)?)
    }

    fn update_product(&mut self, id: ProductId, product: &Product) -> Result<()> {
        Ok(self.client.update(id, product)?)
    }

    fn delete_product(&mut self, id: ProductId) -> Result<()> {
        Ok(self.client.delete(id)?)
    }
}
