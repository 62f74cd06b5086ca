//! Order Lifecycle Manager
//!
//! Admin-driven status changes and deletion. Whether stock goes back to
//! inventory is decided here from the order's previous status, inside the
//! same transaction that writes the new status or removes the order.

use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::identity::{AdminGrant, Caller};
use crate::publisher::{publish_all, DynPublisher};
use crate::services::restoration::{restore_stock, RestorationReport};
use crate::store::DynStore;
use crate::{EcommerceError, Result};

/// `PUT /api/orders/:id` body. Absent fields are left as they are.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug)]
pub struct OrderDeletion {
    pub order: Order,
    /// Present when the order still held stock and it was given back.
    pub restoration: Option<RestorationReport>,
}

impl OrderDeletion {
    pub fn stock_restored(&self) -> bool { self.restoration.is_some() }
}

#[derive(Clone)]
pub struct OrderLifecycle {
    store: DynStore,
    publisher: DynPublisher,
}

impl OrderLifecycle {
    pub fn new(store: DynStore, publisher: DynPublisher) -> Self { Self { store, publisher } }

    /// Newest first. Admins see everything or one user's orders, everyone else only their own.
    #[instrument(skip(self, caller))]
    pub async fn list_orders(&self, caller: &Caller, user_id: Option<String>) -> Result<Vec<Order>> {
        let scope = caller.order_scope(user_id)?;
        Ok(self.store.list_orders(scope.as_deref()).await?)
    }

    #[instrument(skip(self, _grant, patch), fields(status = ?patch.status))]
    pub async fn update_order(&self, _grant: &AdminGrant, id: Uuid, patch: OrderPatch) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx.lock_order(id).await?.ok_or(EcommerceError::OrderNotFound(id))?;

        let mut events: Vec<DomainEvent> = vec![];
        if let Some(next) = patch.status {
            let transition = order.transition(next)?;
            if transition.restores_stock() {
                let report = restore_stock(&mut *tx, &order.items).await?;
                info!(order_id = %order.order_id, from = %transition.from, to = %transition.to, restored = report.restored.len(), skipped = report.skipped.len(), "stock restored");
                events.extend(report.events());
            }
        }
        if let Some(notes) = patch.admin_notes {
            order.annotate(notes);
        }

        tx.save_order(&order).await?;
        tx.commit().await?;

        info!(order_id = %order.order_id, status = %order.status, "order updated");
        let mut published = order.take_events();
        published.extend(events);
        publish_all(self.publisher.as_ref(), published).await;
        Ok(order)
    }

    /// Removes an order. Units come back only if the order was still holding them:
    /// delivered orders are final, rejected and cancelled ones were already restored.
    #[instrument(skip(self, _grant))]
    pub async fn delete_order(&self, _grant: &AdminGrant, id: Uuid) -> Result<OrderDeletion> {
        let mut tx = self.store.begin().await?;
        let order = tx.lock_order(id).await?.ok_or(EcommerceError::OrderNotFound(id))?;

        let restoration = if order.status.holds_stock() {
            Some(restore_stock(&mut *tx, &order.items).await?)
        } else {
            None
        };
        if !tx.delete_order(id).await? {
            return Err(EcommerceError::OrderNotFound(id));
        }
        tx.commit().await?;

        let deletion = OrderDeletion { order, restoration };
        info!(order_id = %deletion.order.order_id, status = %deletion.order.status, stock_restored = deletion.stock_restored(), "order deleted");
        let mut events: Vec<DomainEvent> = vec![OrderEvent::Deleted { id, stock_restored: deletion.stock_restored() }.into()];
        if let Some(report) = &deletion.restoration {
            events.extend(report.events());
        }
        publish_all(self.publisher.as_ref(), events).await;
        Ok(deletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::address;
    use crate::domain::aggregates::product::tests::simple_draft;
    use crate::domain::aggregates::{LineItem, NewOrder, Product};
    use crate::domain::value_objects::{PaymentMethod, Quantity};
    use crate::publisher::LogPublisher;
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    async fn seeded(stock: u32, ordered: u32) -> (MemoryStore, Product, Order) {
        let lamp = Product::create(simple_draft("Lamp", 10, stock)).unwrap();
        let store = MemoryStore::with_products([lamp.clone()]);
        let item = LineItem { product_id: lamp.id, name: lamp.name.clone(), price: lamp.price, quantity: ordered, image: lamp.image.clone(), selected_size: None, selected_color: None, product: None };
        let order = Order::place(NewOrder {
            user_id: "user_1".into(), user_email: "ada@example.com".into(), items: vec![item],
            delivery_address: address(), payment_method: PaymentMethod::Cod, total_amount: lamp.price,
        });
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();
        (store, lamp, order)
    }

    fn lifecycle(store: &MemoryStore) -> OrderLifecycle {
        OrderLifecycle::new(Arc::new(store.clone()), Arc::new(LogPublisher))
    }

    fn patch(status: OrderStatus) -> OrderPatch {
        OrderPatch { status: Some(status), admin_notes: None }
    }

    async fn stock(store: &MemoryStore, product: &Product) -> Quantity {
        store.get_product(product.id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_reject_twice_restores_once() {
        let (store, lamp, order) = seeded(7, 3).await;
        let grant = Caller::admin_user("admin").admin().unwrap();
        let lifecycle = lifecycle(&store);

        lifecycle.update_order(&grant, order.id, patch(OrderStatus::Rejected)).await.unwrap();
        assert_eq!(stock(&store, &lamp).await, Quantity::new(10));
        let again = lifecycle.update_order(&grant, order.id, OrderPatch { status: Some(OrderStatus::Rejected), admin_notes: Some("dup".into()) }).await.unwrap();
        assert_eq!(again.admin_notes, "dup");
        assert_eq!(stock(&store, &lamp).await, Quantity::new(10));
    }

    #[tokio::test]
    async fn test_cancel_then_delete_restores_once() {
        let (store, lamp, order) = seeded(7, 3).await;
        let grant = Caller::admin_user("admin").admin().unwrap();
        let lifecycle = lifecycle(&store);

        lifecycle.update_order(&grant, order.id, patch(OrderStatus::Approved)).await.unwrap();
        assert_eq!(stock(&store, &lamp).await, Quantity::new(7));
        lifecycle.update_order(&grant, order.id, patch(OrderStatus::Cancelled)).await.unwrap();
        assert_eq!(stock(&store, &lamp).await, Quantity::new(10));

        let deletion = lifecycle.delete_order(&grant, order.id).await.unwrap();
        assert!(!deletion.stock_restored());
        assert_eq!(stock(&store, &lamp).await, Quantity::new(10));
    }

    #[tokio::test]
    async fn test_delivered_order_delete_keeps_stock() {
        let (store, lamp, order) = seeded(7, 3).await;
        let grant = Caller::admin_user("admin").admin().unwrap();
        let lifecycle = lifecycle(&store);
        for status in [OrderStatus::Approved, OrderStatus::Shipped, OrderStatus::Delivered] {
            lifecycle.update_order(&grant, order.id, patch(status)).await.unwrap();
        }

        let deletion = lifecycle.delete_order(&grant, order.id).await.unwrap();
        assert!(!deletion.stock_restored());
        assert_eq!(stock(&store, &lamp).await, Quantity::new(7));
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_transition_changes_nothing() {
        let (store, lamp, order) = seeded(7, 3).await;
        let grant = Caller::admin_user("admin").admin().unwrap();
        let err = lifecycle(&store).update_order(&grant, order.id, patch(OrderStatus::Delivered)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Delivered }));
        assert_eq!(store.list_orders(None).await.unwrap()[0].status, OrderStatus::Pending);
        assert_eq!(stock(&store, &lamp).await, Quantity::new(7));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let store = MemoryStore::new();
        let grant = Caller::admin_user("admin").admin().unwrap();
        let id = Uuid::now_v7();
        assert!(matches!(lifecycle(&store).update_order(&grant, id, OrderPatch::default()).await, Err(EcommerceError::OrderNotFound(missing)) if missing == id));
        assert!(matches!(lifecycle(&store).delete_order(&grant, id).await, Err(EcommerceError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_listing_is_scoped_to_the_caller() {
        let (store, _, _) = seeded(7, 3).await;
        let lifecycle = lifecycle(&store);
        assert_eq!(lifecycle.list_orders(&Caller::user("user_1"), None).await.unwrap().len(), 1);
        assert!(lifecycle.list_orders(&Caller::user("user_2"), None).await.unwrap().is_empty());
        assert!(matches!(lifecycle.list_orders(&Caller::user("user_2"), Some("user_1".into())).await, Err(EcommerceError::Forbidden)));
        assert_eq!(lifecycle.list_orders(&Caller::admin_user("admin"), None).await.unwrap().len(), 1);
    }
}
