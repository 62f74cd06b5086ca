//! Demo catalog loaded by `POST /api/seed-products`.

use rust_decimal::Decimal;

use crate::domain::aggregates::ProductDraft;

fn sample(name: &str, description: &str, cents: i64, category: &str, stock: u32, featured: bool) -> ProductDraft {
    ProductDraft {
        name: name.into(), description: description.into(), category: category.into(), price: Decimal::new(cents, 2),
        image: "/image.png".into(), images: vec![], stock, featured, has_variants: false,
        available_sizes: vec![], available_colors: vec![], variants: vec![],
    }
}

pub fn sample_catalog() -> Vec<ProductDraft> {
    vec![
        sample("Immersive VR Headset Pro", "Step into new realities with stunning visuals and haptic feedback. Compatible with all major gaming platforms.", 29999, "Electronics", 25, true),
        sample("Compact Travel Drone 4K", "Capture breathtaking aerial footage wherever you go. Foldable design for ultimate portability.", 19950, "Electronics", 15, true),
        sample("Vintage Bluetooth Speaker", "Classic aesthetics meet modern sound. Enjoy rich audio with long-lasting battery life.", 7500, "Audio", 40, false),
        sample("Smartwatch Elite", "Stay connected and track your fitness with this sleek and powerful smartwatch.", 12000, "Wearables", 30, true),
        sample("Portable Espresso Maker", "Enjoy barista-quality coffee anywhere. Compact and easy to use for the discerning traveler.", 6025, "Kitchen", 20, false),
        sample("AI-Powered Security Camera", "Keep your home safe with intelligent motion detection and 24/7 cloud recording.", 15000, "Security", 18, true),
    ]
}
