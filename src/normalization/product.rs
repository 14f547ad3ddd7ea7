//! Promoted-product extraction.

use serde::Serialize;

use crate::normalization::record::{Link, RawPromotion};
use crate::normalization::units;

/// A normalized promoted product, ready for the four product columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub title: String,
    /// Major currency units (yuan).
    pub price_yuan: f64,
    pub sales: u64,
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductExtractor;

impl ProductExtractor {
    /// Pick at most one product from the promotion list.
    ///
    /// The table models a single promoted product per row, so only the first
    /// entry is projected; later entries are dropped. An empty list yields
    /// `(false, None)` and the product columns stay absent downstream.
    pub fn extract(&self, promotions: &[RawPromotion]) -> (bool, Option<Product>) {
        let Some(first) = promotions.first() else {
            return (false, None);
        };
        let link = first
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(Link::product);
        let product = Product {
            title: first.title.clone().unwrap_or_default(),
            price_yuan: units::minor_to_major(units::coerce_count(&first.price) as i64),
            sales: units::coerce_count(&first.sales),
            link,
        };
        (true, Some(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn promotion(title: &str, price: serde_json::Value, sales: serde_json::Value) -> RawPromotion {
        RawPromotion {
            title: Some(title.into()),
            price,
            sales,
            url: Some(format!("https://haohuo.douyin.com/{title}")),
        }
    }

    #[test]
    fn empty_list_has_no_product() {
        assert_eq!(ProductExtractor.extract(&[]), (false, None));
    }

    #[test]
    fn only_the_first_entry_is_kept() {
        let (has, product) = ProductExtractor.extract(&[
            promotion("first", json!(9900), json!(12)),
            promotion("second", json!(100), json!(1)),
        ]);
        assert!(has);
        let product = product.unwrap();
        assert_eq!(product.title, "first");
        assert_eq!(product.price_yuan, 99.0);
        assert_eq!(product.sales, 12);
        assert_eq!(
            product.link.unwrap().link,
            "https://haohuo.douyin.com/first"
        );
    }

    #[test]
    fn loose_fields_degrade_instead_of_failing() {
        let raw = RawPromotion {
            title: None,
            price: json!(null),
            sales: json!("oops"),
            url: Some("  ".into()),
        };
        let (has, product) = ProductExtractor.extract(&[raw]);
        assert!(has);
        let product = product.unwrap();
        assert_eq!(product.title, "");
        assert_eq!(product.price_yuan, 0.0);
        assert_eq!(product.sales, 0);
        assert!(product.link.is_none());
    }

    #[test]
    fn product_link_carries_the_fixed_label() {
        let (_, product) = ProductExtractor.extract(&[promotion("p", json!(1), json!(0))]);
        assert_eq!(product.unwrap().link.unwrap().text, "查看商品");
    }
}
