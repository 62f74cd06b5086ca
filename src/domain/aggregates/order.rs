//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::product::{ProductDetail, ProductId};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{OrderNumber, PaymentMethod, UnknownValue, VariantKey};
use crate::EcommerceError;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub order_id: OrderNumber,
    pub user_id: String,
    pub user_email: String,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub admin_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// Snapshot of a product at order time. Later product edits never reach it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub image: String,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
    /// Live product detail, resolved when the order is read. Absent once the product is deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductDetail>,
}

impl LineItem {
    pub fn variant_key(&self) -> Option<VariantKey> {
        VariantKey::from_selection(self.selected_size.as_deref(), self.selected_color.as_deref())
    }

    /// `price × quantity`, or `None` when it does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> { self.price.checked_mul(Decimal::from(self.quantity)) }

    /// Sum of the line totals.
    pub fn sum(items: &[LineItem]) -> Result<Decimal, EcommerceError> {
        items.iter()
            .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.line_total()?))
            .ok_or_else(|| EcommerceError::validation("Order total out of range"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Address line 1 is required"))]
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "Contact number is required"))]
    pub contact_number: String,
}

impl DeliveryAddress {
    /// Trims every field so whitespace-only values fail validation.
    pub fn normalized(mut self) -> Self {
        for field in [&mut self.full_name, &mut self.address_line1, &mut self.city, &mut self.state, &mut self.postal_code, &mut self.country, &mut self.contact_number] {
            *field = field.trim().to_string();
        }
        self.address_line2 = self.address_line2.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Approved, Rejected, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Approved => "approved", Self::Rejected => "rejected",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    /// States in which the order's units are still taken out of inventory.
    pub fn holds_stock(&self) -> bool { matches!(self, Self::Pending | Self::Approved | Self::Shipped) }

    /// States reached by giving the order's units back to inventory.
    pub fn releases_stock(&self) -> bool { matches!(self, Self::Rejected | Self::Cancelled) }

    pub fn can_become(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        *self == next || matches!(
            (*self, next),
            (Pending, Approved | Rejected | Cancelled)
                | (Approved, Shipped | Rejected | Cancelled)
                | (Shipped, Delivered | Rejected)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = UnknownValue;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending), "approved" => Ok(Self::Approved), "rejected" => Ok(Self::Rejected),
            "shipped" => Ok(Self::Shipped), "delivered" => Ok(Self::Delivered), "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Outcome of a status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Transition {
    /// True exactly once per order: when it first leaves a stock-holding state for a releasing one.
    pub fn restores_stock(&self) -> bool { self.from.holds_stock() && self.to.releases_stock() }
    pub fn is_noop(&self) -> bool { self.from == self.to }
}

/// Everything needed to record a reserved cart as an order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user_id: String,
    pub user_email: String,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
}

impl Order {
    /// Creates a `pending` order with a fresh order number.
    pub fn place(new: NewOrder) -> Self {
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), order_id: OrderNumber::generate(), user_id: new.user_id, user_email: new.user_email,
            items: new.items, delivery_address: new.delivery_address, payment_method: new.payment_method,
            total_amount: new.total_amount, status: OrderStatus::Pending, admin_notes: String::new(),
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            id: order.id, order_id: order.order_id.clone(), user_id: order.user_id.clone(), total_amount: order.total_amount,
        }));
        order
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<Transition, EcommerceError> {
        let from = self.status;
        if !from.can_become(next) {
            return Err(EcommerceError::InvalidTransition { from, to: next });
        }
        let transition = Transition { from, to: next };
        if !transition.is_noop() {
            self.status = next;
            self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { id: self.id, from, to: next }));
        }
        self.touch();
        Ok(transition)
    }

    pub fn annotate(&mut self, notes: impl Into<String>) { self.admin_notes = notes.into(); self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
