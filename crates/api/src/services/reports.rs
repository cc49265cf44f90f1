//! Sales report aggregation.
//!
//! Revenue only counts delivered orders. Aggregation is pure so it can be
//! tested without a database; `db::reports` supplies the rows.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use shopfront_core::{ProductId, round_money};

/// Number of products listed in `top_products`.
pub const TOP_PRODUCTS: usize = 10;

/// A delivered order as seen by the report.
#[derive(Debug, Clone)]
pub struct ReportOrder {
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<ReportLine>,
}

/// One order line as seen by the report.
#[derive(Debug, Clone)]
pub struct ReportLine {
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Revenue for one calendar month (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    /// `YYYY-MM`.
    pub month: String,
    pub revenue: Decimal,
    pub orders: i64,
}

/// Units and revenue for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: Option<ProductId>,
    pub name: String,
    pub sold: i64,
    pub revenue: Decimal,
}

/// The admin sales report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub total_revenue: Decimal,
    pub delivered_orders: i64,
    pub average_order_value: Decimal,
    pub total_items_sold: i64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Hash, PartialEq, Eq)]
enum ProductKey {
    Id(ProductId),
    Deleted(String),
}

impl SalesReport {
    /// Aggregate delivered orders into a report.
    #[must_use]
    pub fn from_orders(orders: &[ReportOrder]) -> Self {
        let mut total_revenue = Decimal::ZERO;
        let mut total_items_sold = 0_i64;
        let mut months: BTreeMap<String, (Decimal, i64)> = BTreeMap::new();
        let mut products: HashMap<ProductKey, TopProduct> = HashMap::new();

        for order in orders {
            total_revenue += order.total;

            let month = months
                .entry(order.created_at.format("%Y-%m").to_string())
                .or_insert((Decimal::ZERO, 0));
            month.0 += order.total;
            month.1 += 1;

            for line in &order.lines {
                let quantity = i64::from(line.quantity);
                total_items_sold += quantity;

                let key = line
                    .product_id
                    .map_or_else(|| ProductKey::Deleted(line.name.clone()), ProductKey::Id);
                let entry = products.entry(key).or_insert_with(|| TopProduct {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    sold: 0,
                    revenue: Decimal::ZERO,
                });
                entry.sold += quantity;
                entry.revenue += line.unit_price * Decimal::from(line.quantity);
            }
        }

        let delivered_orders = i64::try_from(orders.len()).unwrap_or(i64::MAX);
        let average_order_value = if delivered_orders == 0 {
            Decimal::ZERO
        } else {
            round_money(total_revenue / Decimal::from(delivered_orders))
        };

        let mut top_products: Vec<TopProduct> = products.into_values().collect();
        top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
        top_products.truncate(TOP_PRODUCTS);

        Self {
            total_revenue,
            delivered_orders,
            average_order_value,
            total_items_sold,
            monthly_revenue: months
                .into_iter()
                .map(|(month, (revenue, orders))| MonthlyRevenue {
                    month,
                    revenue,
                    orders,
                })
                .collect(),
            top_products,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(id: Option<i32>, name: &str, price: &str, quantity: i32) -> ReportLine {
        ReportLine {
            product_id: id.map(ProductId::new),
            name: name.to_string(),
            unit_price: dec(price),
            quantity,
        }
    }

    fn order(total: &str, y: i32, m: u32, d: u32, lines: Vec<ReportLine>) -> ReportOrder {
        ReportOrder {
            total: dec(total),
            created_at: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            lines,
        }
    }

    #[test]
    fn test_empty_report() {
        let report = SalesReport::from_orders(&[]);
        assert_eq!(report.total_revenue, Decimal::ZERO);
        assert_eq!(report.delivered_orders, 0);
        assert_eq!(report.average_order_value, Decimal::ZERO);
        assert!(report.monthly_revenue.is_empty());
        assert!(report.top_products.is_empty());
    }

    #[test]
    fn test_totals_and_average() {
        let orders = vec![
            order("31.59", 2026, 1, 5, vec![line(Some(1), "Tee", "20.00", 1)]),
            order("64.80", 2026, 1, 20, vec![line(Some(2), "Jeans", "60.00", 1)]),
            order("10.00", 2026, 3, 2, vec![line(Some(1), "Tee", "5.00", 2)]),
        ];
        let report = SalesReport::from_orders(&orders);

        assert_eq!(report.total_revenue, dec("106.39"));
        assert_eq!(report.delivered_orders, 3);
        // 106.39 / 3 = 35.4633.. -> 35.46
        assert_eq!(report.average_order_value, dec("35.46"));
        assert_eq!(report.total_items_sold, 4);
    }

    #[test]
    fn test_monthly_revenue_ascending() {
        let orders = vec![
            order("10.00", 2026, 3, 2, vec![]),
            order("20.00", 2025, 12, 31, vec![]),
            order("5.00", 2026, 3, 28, vec![]),
        ];
        let report = SalesReport::from_orders(&orders);

        let months: Vec<&str> = report
            .monthly_revenue
            .iter()
            .map(|m| m.month.as_str())
            .collect();
        assert_eq!(months, ["2025-12", "2026-03"]);
        assert_eq!(report.monthly_revenue[1].revenue, dec("15.00"));
        assert_eq!(report.monthly_revenue[1].orders, 2);
    }

    #[test]
    fn test_top_products_rank_by_revenue_then_name() {
        let orders = vec![order(
            "0",
            2026,
            1,
            1,
            vec![
                line(Some(1), "Socks", "5.00", 4),
                line(Some(2), "Belt", "20.00", 1),
                line(Some(3), "Coat", "90.00", 1),
                line(None, "Discontinued Hat", "1.00", 3),
            ],
        )];
        let report = SalesReport::from_orders(&orders);

        let names: Vec<&str> = report.top_products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Coat", "Belt", "Socks", "Discontinued Hat"]);
        assert_eq!(report.top_products[2].sold, 4);
        assert_eq!(report.top_products[3].product_id, None);
    }

    #[test]
    fn test_top_products_merge_across_orders_and_cap_at_ten() {
        let mut lines: Vec<ReportLine> = (1..=12)
            .map(|i| line(Some(i), &format!("P{i:02}"), "1.00", i))
            .collect();
        lines.push(line(Some(1), "P01", "1.00", 100));
        let report = SalesReport::from_orders(&[order("0", 2026, 1, 1, lines)]);

        assert_eq!(report.top_products.len(), TOP_PRODUCTS);
        assert_eq!(report.top_products[0].name, "P01");
        assert_eq!(report.top_products[0].sold, 101);
    }
}
