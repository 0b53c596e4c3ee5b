//! # Sales Summaries
//!
//! Pure aggregation over hydrated sales. The database layer fetches, this
//! module groups and ranks.
//!
//! ## Daily Summary Shape
//! ```text
//! 2024-06-01 ─┬─ sales_count / total_amount_cents
//!             ├─ top_products    (≤ 5, quantity desc)
//!             ├─ top_categories  (≤ 5, quantity desc)
//!             └─ by_user         (amount desc)
//! 2024-05-31 ─┬─ ...
//! ```
//!
//! ## Ordering Rules
//! - Buckets are keyed by the UTC calendar date of `created_at`, newest first.
//! - Ranked lists use a stable sort, so equal values keep the order in
//!   which they were first encountered in the input.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::SaleDetail;
use crate::TOP_ENTRIES;

// =============================================================================
// Report Types
// =============================================================================

/// A ranked product or category with the quantity sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopEntry {
    pub id: String,
    pub name: String,
    pub quantity: i64,
}

/// Sale count and amount attributed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserTally {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub count: i64,
    pub amount_cents: i64,
}

/// One calendar day of sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySummary {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub sales_count: i64,
    pub total_amount_cents: i64,
    pub top_products: Vec<TopEntry>,
    pub top_categories: Vec<TopEntry>,
    pub by_user: Vec<UserTally>,
}

/// Count and amount of a set of sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesTally {
    pub count: i64,
    pub amount_cents: i64,
}

impl SalesTally {
    pub fn add(&mut self, amount_cents: i64) {
        self.count += 1;
        self.amount_cents += amount_cents;
    }
}

/// Dashboard statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesStats {
    pub total_sales: SalesTally,
    pub today_sales: SalesTally,
    pub month_sales: SalesTally,
    pub sales_by_user: Vec<UserTally>,
}

// =============================================================================
// Ranking Helper
// =============================================================================

/// Accumulates quantities per key, remembering first-encounter order.
#[derive(Default)]
struct Ranking {
    index: HashMap<String, usize>,
    entries: Vec<TopEntry>,
}

impl Ranking {
    fn add(&mut self, id: &str, name: &str, quantity: i64) {
        match self.index.get(id) {
            Some(&i) => self.entries[i].quantity += quantity,
            None => {
                self.index.insert(id.to_string(), self.entries.len());
                self.entries.push(TopEntry {
                    id: id.to_string(),
                    name: name.to_string(),
                    quantity,
                });
            }
        }
    }

    fn top(mut self, n: usize) -> Vec<TopEntry> {
        // sort_by is stable: ties keep encounter order
        self.entries.sort_by(|a, b| b.quantity.cmp(&a.quantity));
        self.entries.truncate(n);
        self.entries
    }
}

#[derive(Default)]
struct UserRanking {
    index: HashMap<String, usize>,
    entries: Vec<UserTally>,
}

impl UserRanking {
    fn add(&mut self, detail: &SaleDetail) {
        let amount = detail.sale.total_cents;
        match self.index.get(&detail.user.id) {
            Some(&i) => {
                self.entries[i].count += 1;
                self.entries[i].amount_cents += amount;
            }
            None => {
                self.index.insert(detail.user.id.clone(), self.entries.len());
                self.entries.push(UserTally {
                    user_id: detail.user.id.clone(),
                    username: detail.user.username.clone(),
                    full_name: detail.user.full_name.clone(),
                    count: 1,
                    amount_cents: amount,
                });
            }
        }
    }

    fn ranked(mut self) -> Vec<UserTally> {
        self.entries
            .sort_by(|a, b| b.amount_cents.cmp(&a.amount_cents));
        self.entries
    }
}

#[derive(Default)]
struct DayBucket {
    sales: SalesTally,
    products: Ranking,
    categories: Ranking,
    users: UserRanking,
}

// =============================================================================
// Aggregation
// =============================================================================

/// Groups sales into daily summaries, newest date first.
///
/// ## Example
/// Two sales on the same day for 35.70 and 10.00 produce one summary with
/// `sales_count == 2` and `total_amount_cents == 4570`.
pub fn summarize(sales: &[SaleDetail]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for detail in sales {
        let bucket = days.entry(detail.sale.created_at.date_naive()).or_default();

        bucket.sales.add(detail.sale.total_cents);
        bucket.users.add(detail);

        for line in &detail.items {
            let product = &line.product;
            bucket
                .products
                .add(&product.id, &product.name, line.item.quantity);

            if let Some(category) = &product.category {
                bucket
                    .categories
                    .add(&category.id, &category.name, line.item.quantity);
            }
        }
    }

    days.into_iter()
        .rev()
        .map(|(date, bucket)| DailySummary {
            date,
            sales_count: bucket.sales.count,
            total_amount_cents: bucket.sales.amount_cents,
            top_products: bucket.products.top(TOP_ENTRIES),
            top_categories: bucket.categories.top(TOP_ENTRIES),
            by_user: bucket.users.ranked(),
        })
        .collect()
}

// =============================================================================
// Reporting Periods
// =============================================================================

/// Start instants of the "today" and "this month" reporting windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStarts {
    pub today: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

/// Local midnight and local first-of-month for `now`, as UTC instants.
///
/// `now` carries the time zone, so callers pass `Local::now()` in
/// production and a fixed offset in tests.
pub fn period_starts<Tz: TimeZone>(now: &DateTime<Tz>) -> PeriodStarts {
    let tz = now.timezone();
    let today = now.date_naive();
    let first_of_month = today.with_day(1).unwrap_or(today);

    PeriodStarts {
        today: local_day_start(&tz, today),
        month: local_day_start(&tz, first_of_month),
    }
}

fn local_day_start<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    match tz.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day starts an hour later.
        None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|start| start.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CategorySummary, ProductSummary, Role, Sale, SaleItem, SaleItemDetail, UserSummary,
    };
    use chrono::FixedOffset;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn user(id: &str) -> UserSummary {
        UserSummary {
            id: id.to_string(),
            username: id.to_string(),
            full_name: format!("User {id}"),
            role: Role::Cashier,
        }
    }

    fn line(product: &str, category: Option<&str>, quantity: i64) -> SaleItemDetail {
        SaleItemDetail {
            item: SaleItem {
                id: format!("item-{product}"),
                sale_id: "sale".to_string(),
                product_id: product.to_string(),
                quantity,
                unit_price_cents: 100,
                discount_bps: 0,
                line_total_cents: 100 * quantity,
                created_at: Utc::now(),
            },
            product: ProductSummary {
                id: product.to_string(),
                sku: product.to_uppercase(),
                name: format!("Product {product}"),
                category: category.map(|c| CategorySummary {
                    id: c.to_string(),
                    name: format!("Category {c}"),
                }),
            },
        }
    }

    fn sale(id: &str, user_id: &str, created_at: &str, total: i64, items: Vec<SaleItemDetail>) -> SaleDetail {
        SaleDetail {
            sale: Sale {
                id: id.to_string(),
                user_id: user_id.to_string(),
                subtotal_cents: total,
                tax_cents: 0,
                tax_rate_bps: 0,
                tax_included: false,
                total_cents: total,
                created_at: at(created_at),
            },
            user: user(user_id),
            items,
        }
    }

    #[test]
    fn test_same_day_sales_are_summed() {
        let sales = vec![
            sale("s1", "u1", "2024-06-01T09:00:00Z", 3570, vec![line("a", None, 3)]),
            sale("s2", "u1", "2024-06-01T17:30:00Z", 1000, vec![line("b", None, 1)]),
        ];

        let summaries = summarize(&sales);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].sales_count, 2);
        assert_eq!(summaries[0].total_amount_cents, 4570);
    }

    #[test]
    fn test_days_are_newest_first_by_utc_date() {
        let sales = vec![
            sale("s1", "u1", "2024-05-31T23:59:59Z", 100, vec![]),
            sale("s2", "u1", "2024-06-02T00:00:00Z", 200, vec![]),
            // 23:30 at -02:00 is already June 2nd in UTC
            sale("s3", "u1", "2024-06-01T23:30:00-02:00", 300, vec![]),
        ];

        let dates: Vec<String> = summarize(&sales)
            .iter()
            .map(|s| s.date.to_string())
            .collect();
        assert_eq!(dates, vec!["2024-06-02", "2024-05-31"]);
    }

    #[test]
    fn test_top_products_tie_break_by_first_encounter() {
        let sales = vec![sale(
            "s1",
            "u1",
            "2024-06-01T10:00:00Z",
            0,
            vec![
                line("c", Some("x"), 2),
                line("a", Some("y"), 5),
                line("b", Some("x"), 2),
                line("d", None, 1),
                line("e", None, 1),
                line("f", None, 1),
            ],
        )];

        let summary = &summarize(&sales)[0];
        let ids: Vec<&str> = summary.top_products.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b", "d", "e"]);

        // uncategorised lines are skipped
        let categories: Vec<(&str, i64)> = summary
            .top_categories
            .iter()
            .map(|e| (e.id.as_str(), e.quantity))
            .collect();
        assert_eq!(categories, vec![("y", 5), ("x", 4)]);
    }

    #[test]
    fn test_by_user_sorted_by_amount() {
        let sales = vec![
            sale("s1", "alice", "2024-06-01T10:00:00Z", 500, vec![]),
            sale("s2", "bob", "2024-06-01T11:00:00Z", 700, vec![]),
            sale("s3", "alice", "2024-06-01T12:00:00Z", 300, vec![]),
            sale("s4", "carol", "2024-06-01T13:00:00Z", 700, vec![]),
        ];

        let by_user = &summarize(&sales)[0].by_user;
        let order: Vec<(&str, i64, i64)> = by_user
            .iter()
            .map(|u| (u.user_id.as_str(), u.count, u.amount_cents))
            .collect();
        assert_eq!(
            order,
            vec![("alice", 2, 800), ("bob", 1, 700), ("carol", 1, 700)]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn test_period_starts_use_local_calendar() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 15, 1, 30, 0).unwrap();

        let starts = period_starts(&now);
        assert_eq!(starts.today, at("2024-06-14T22:00:00Z"));
        assert_eq!(starts.month, at("2024-05-31T22:00:00Z"));
    }

    #[test]
    fn test_sales_tally_add() {
        let mut tally = SalesTally::default();
        tally.add(3570);
        tally.add(1000);
        assert_eq!(tally, SalesTally { count: 2, amount_cents: 4570 });
    }
}
