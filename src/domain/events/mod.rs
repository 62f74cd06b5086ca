//! Domain events
use crate::domain::value_objects::{OrderNumber, VariantKey};
use crate::domain::aggregates::OrderStatus;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProductEvent {
    Created { product_id: Uuid },
    Updated { product_id: Uuid },
    Deleted { product_id: Uuid },
    StockReserved { product_id: Uuid, variant: Option<VariantKey>, quantity: u32, remaining: u32 },
    StockRestored { product_id: Uuid, variant: Option<VariantKey>, quantity: u32, stock: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Placed { id: Uuid, order_id: OrderNumber, user_id: String, total_amount: Decimal },
    StatusChanged { id: Uuid, from: OrderStatus, to: OrderStatus },
    Deleted { id: Uuid, stock_restored: bool },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("products", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::Updated { .. } => "updated",
                ProductEvent::Deleted { .. } => "deleted",
                ProductEvent::StockReserved { .. } => "stock_reserved",
                ProductEvent::StockRestored { .. } => "stock_restored",
            }),
            Self::Order(e) => ("orders", match e {
                OrderEvent::Placed { .. } => "placed",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::Deleted { .. } => "deleted",
            }),
        };
        format!("storefront.{aggregate}.{name}")
    }
}

impl From<ProductEvent> for DomainEvent {
    fn from(e: ProductEvent) -> Self { Self::Product(e) }
}

impl From<OrderEvent> for DomainEvent {
    fn from(e: OrderEvent) -> Self { Self::Order(e) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        let e = DomainEvent::from(OrderEvent::Deleted { id: Uuid::nil(), stock_restored: true });
        assert_eq!(e.subject(), "storefront.orders.deleted");
        let e = DomainEvent::from(ProductEvent::StockReserved { product_id: Uuid::nil(), variant: None, quantity: 1, remaining: 0 });
        assert_eq!(e.subject(), "storefront.products.stock_reserved");
    }

    #[test]
    fn test_event_payload_shape() {
        let e = DomainEvent::from(OrderEvent::StatusChanged { id: Uuid::nil(), from: OrderStatus::Pending, to: OrderStatus::Rejected });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "status_changed");
        assert_eq!(json["from"], "pending");
        assert_eq!(json["to"], "rejected");
    }
}
