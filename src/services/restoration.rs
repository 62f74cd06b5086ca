//! Stock Restoration Engine: gives an order's units back to inventory.
//!
//! Best-effort per item. A product deleted since the order was placed, or a
//! variant that no longer exists, is logged and skipped. Storage failures
//! still abort, and the caller's transaction rolls everything back.

use std::fmt;
use tracing::{info, instrument, warn};

use crate::domain::aggregates::{LineItem, ProductId};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Quantity, VariantKey};
use crate::store::{StoreError, StoreTransaction};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoredItem {
    pub product_id: ProductId,
    pub variant: Option<VariantKey>,
    pub quantity: u32,
    pub stock: Quantity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    ProductMissing,
    VariantMissing,
    SelectionMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ProductMissing => "product no longer exists",
            Self::VariantMissing => "variant no longer exists",
            Self::SelectionMissing => "item has no size/color selection",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedItem {
    pub product_id: ProductId,
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RestorationReport {
    pub restored: Vec<RestoredItem>,
    pub skipped: Vec<SkippedItem>,
}

impl RestorationReport {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.restored.iter()
            .map(|r| ProductEvent::StockRestored { product_id: r.product_id, variant: r.variant.clone(), quantity: r.quantity, stock: r.stock.value() }.into())
            .collect()
    }
}

/// Increments stock for every item, inside the caller's transaction.
///
/// Callers decide whether an order still holds stock; running this twice for
/// the same order double-counts.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn restore_stock(tx: &mut dyn StoreTransaction, items: &[LineItem]) -> Result<RestorationReport, StoreError> {
    let mut report = RestorationReport::default();

    // Same lock order as reservation.
    let mut ordered: Vec<&LineItem> = items.iter().collect();
    ordered.sort_by_key(|item| item.product_id);

    for item in ordered {
        let skip = |reason| SkippedItem { product_id: item.product_id, name: item.name.clone(), reason };

        let Some(product) = tx.lock_product(item.product_id).await? else {
            warn!(product_id = %item.product_id, name = %item.name, "product not found for stock restoration");
            report.skipped.push(skip(SkipReason::ProductMissing));
            continue;
        };

        let variant = if product.has_variants {
            match item.variant_key() {
                Some(key) => Some(key),
                None => {
                    warn!(product = %product.name, "variant product item carries no selection, skipping");
                    report.skipped.push(skip(SkipReason::SelectionMissing));
                    continue;
                }
            }
        } else {
            None
        };

        match tx.put_stock(product.id, variant.as_ref(), item.quantity).await? {
            Some(stock) => {
                info!(product = %product.label(variant.as_ref()), quantity = item.quantity, %stock, "restored stock");
                report.restored.push(RestoredItem { product_id: product.id, variant, quantity: item.quantity, stock });
            }
            None => {
                warn!(product = %product.label(variant.as_ref()), "variant not found for stock restoration");
                report.skipped.push(skip(SkipReason::VariantMissing));
            }
        }
    }

    Ok(report)
}
