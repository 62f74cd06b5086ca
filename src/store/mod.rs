//! Persistence seam.
//!
//! Every mutation goes through a [`StoreTransaction`]. Dropping one without
//! calling [`StoreTransaction::commit`] discards everything it did, which is
//! what makes a reservation (N stock decrements plus one order insert) a
//! single all-or-nothing unit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use sqlx::error::{DatabaseError, ErrorKind};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Order, Product, ProductId};
use crate::domain::value_objects::{Quantity, VariantKey};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,

    #[error("stored record is invalid: {0}")]
    Corrupt(String),

    #[error("database error")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::Conflict,
            Some(ErrorKind::CheckViolation) => Self::Corrupt(error.to_string()),
            _ => Self::Database(error),
        }
    }
}

pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Products newest first, optionally only the featured ones.
    async fn list_products(&self, featured_only: bool) -> Result<Vec<Product>, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Orders newest first with line items resolved against live products.
    async fn list_orders(&self, user_id: Option<&str>) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads a product and holds it against concurrent writers until the transaction ends.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Atomically decrements a counter if it holds at least `quantity`.
    ///
    /// Returns the remaining stock, or `None` when the counter is too low, the
    /// variant is missing or the variant is marked unavailable.
    async fn take_stock(&mut self, id: ProductId, variant: Option<&VariantKey>, quantity: u32) -> Result<Option<Quantity>, StoreError>;

    /// Increments a counter. Returns the new stock, or `None` when the product or variant is missing.
    async fn put_stock(&mut self, id: ProductId, variant: Option<&VariantKey>, quantity: u32) -> Result<Option<Quantity>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError>;

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;
    /// Persists status, admin notes and `updated_at`. Everything else on an order is immutable.
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError>;
    async fn delete_order(&mut self, id: Uuid) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
