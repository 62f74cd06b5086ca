//! Storefront Orders
//!
//! Order placement and stock reconciliation for a small storefront.
//!
//! ## Features
//! - Product catalog with optional size x color variants
//! - Cart validation and atomic stock reservation
//! - Order lifecycle with admin-driven status transitions
//! - Exactly-once stock restoration on rejection, cancellation and deletion
//! - PostgreSQL and in-memory storage backends

pub mod api;
pub mod config;
pub mod domain;
pub mod identity;
pub mod publisher;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::domain::aggregates::OrderStatus;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0}")]
    Validation(String),

    #[error("Product {0} not found")]
    ProductNotFound(String),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Selected variant of {name} is not available")]
    VariantUnavailable { name: String },

    #[error("Insufficient stock for {item}. Available: {available}")]
    InsufficientStock { item: String, available: u32 },

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Sign-in required")]
    Unauthorized,

    #[error("Admin role required")]
    Forbidden,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EcommerceError {
    pub fn validation(message: impl Into<String>) -> Self { Self::Validation(message.into()) }
}

impl From<ValidationErrors> for EcommerceError {
    /// Reports the first failing field, in field-name order.
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let message = fields.into_iter()
            .find_map(|(field, errs)| errs.first().map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            }))
            .unwrap_or_else(|| errors.to_string());
        Self::Validation(message)
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_item() {
        let e = EcommerceError::InsufficientStock { item: "Widget (M, Red)".into(), available: 2 };
        assert_eq!(e.to_string(), "Insufficient stock for Widget (M, Red). Available: 2");
        let id = Uuid::nil();
        assert_eq!(EcommerceError::OrderNotFound(id).to_string(), format!("Order {id} not found"));
    }
}
