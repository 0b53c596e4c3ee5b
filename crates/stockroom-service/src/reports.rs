//! # Sales Reports
//!
//! Listing, daily summaries and dashboard statistics, narrowed by the
//! caller's role.
//!
//! ## Visibility
//! ```text
//! ┌──────────────────────┬────────────────────────────────────────────────┐
//! │ Role                 │ Sees                                           │
//! ├──────────────────────┼────────────────────────────────────────────────┤
//! │ Admin, Manager       │ all sales, or `target_user_id` when given      │
//! │ Cashier              │ own sales only (`target_user_id` ignored)      │
//! │                      │ no dashboard statistics                        │
//! └──────────────────────┴────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockroom_core::summary::{period_starts, summarize, DailySummary, SalesStats};
use stockroom_core::{Role, SaleDetail};
use stockroom_db::{Database, SaleQuery};

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Filter
// =============================================================================

/// Who is asking, and for which sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesFilter {
    pub acting_role: Role,
    pub acting_user_id: String,
    /// Honoured for elevated roles only.
    pub target_user_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end: Option<DateTime<Utc>>,
}

impl SalesFilter {
    pub fn new(acting_role: Role, acting_user_id: impl Into<String>) -> Self {
        SalesFilter {
            acting_role,
            acting_user_id: acting_user_id.into(),
            target_user_id: None,
            start: None,
            end: None,
        }
    }

    pub fn target_user(mut self, user_id: impl Into<String>) -> Self {
        self.target_user_id = Some(user_id.into());
        self
    }

    /// Restricts to the UTC calendar days `from..=to`.
    pub fn with_dates(self, from: NaiveDate, to: NaiveDate) -> Self {
        self.since(from).until(to)
    }

    /// Sales from the start of `day` (UTC) on.
    pub fn since(mut self, day: NaiveDate) -> Self {
        self.start = Some(day.and_time(NaiveTime::MIN).and_utc());
        self
    }

    /// Sales up to the last instant of `day` (UTC).
    pub fn until(mut self, day: NaiveDate) -> Self {
        let midnight = day.and_time(NaiveTime::MIN).and_utc();
        self.end = Some(
            midnight
                .checked_add_signed(Duration::days(1))
                .map_or(DateTime::<Utc>::MAX_UTC, |next| next - Duration::nanoseconds(1)),
        );
        self
    }

    /// The repository query after role narrowing.
    fn scoped(&self) -> SaleQuery {
        let user_id = if self.acting_role.is_elevated() {
            self.target_user_id.clone()
        } else {
            Some(self.acting_user_id.clone())
        };

        SaleQuery {
            user_id,
            start: self.start,
            end: self.end,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Read-only sales reporting.
#[derive(Debug, Clone)]
pub struct ReportService {
    db: Database,
}

impl ReportService {
    pub fn new(db: Database) -> Self {
        ReportService { db }
    }

    /// Hydrated sales visible to the caller, newest first.
    pub async fn list_sales(&self, filter: &SalesFilter) -> ServiceResult<Vec<SaleDetail>> {
        let query = filter.scoped();
        debug!(role = filter.acting_role.as_str(), user_id = ?query.user_id, "Listing sales");

        Ok(self.db.sales().list_details(&query).await?)
    }

    /// One sale. Restricted callers get `NotFound` for sales of other users.
    pub async fn get_sale(
        &self,
        id: &str,
        acting_role: Role,
        acting_user_id: &str,
    ) -> ServiceResult<SaleDetail> {
        let detail = self
            .db
            .sales()
            .get_detail(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", id))?;

        if !acting_role.is_elevated() && detail.sale.user_id != acting_user_id {
            return Err(ServiceError::not_found("Sale", id));
        }

        Ok(detail)
    }

    /// Per-day aggregates of the visible sales, newest day first.
    pub async fn summarize_sales(&self, filter: &SalesFilter) -> ServiceResult<Vec<DailySummary>> {
        let sales = self.list_sales(filter).await?;
        Ok(summarize(&sales))
    }

    /// Dashboard statistics relative to the local clock.
    pub async fn get_sales_stats(&self, acting_role: Role) -> ServiceResult<SalesStats> {
        self.sales_stats_at(acting_role, &Local::now()).await
    }

    /// Dashboard statistics with "today" and "this month" taken from `now`.
    pub async fn sales_stats_at<Tz: TimeZone>(
        &self,
        acting_role: Role,
        now: &DateTime<Tz>,
    ) -> ServiceResult<SalesStats> {
        if !acting_role.is_elevated() {
            return Err(ServiceError::Unauthorized(format!(
                "role '{}' cannot view sales statistics",
                acting_role.as_str()
            )));
        }

        let periods = period_starts(now);
        let sales = self.db.sales();

        Ok(SalesStats {
            total_sales: sales.tally_since(None).await?,
            today_sales: sales.tally_since(Some(periods.today)).await?,
            month_sales: sales.tally_since(Some(periods.month)).await?,
            sales_by_user: sales.tally_by_user().await?,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockroom_core::TaxRate;
    use stockroom_db::{DbConfig, NewProduct};

    use super::*;
    use crate::audit::AuditDispatcher;
    use crate::engine::{CreateSaleRequest, SaleEngine, SaleLine};

    struct Shop {
        reports: ReportService,
        ana: String,
        ben: String,
        boss: String,
        ana_sale: SaleDetail,
        ben_sale: SaleDetail,
    }

    fn sale(user_id: &str, product_id: &str, quantity: i64, rate: TaxRate) -> CreateSaleRequest {
        CreateSaleRequest {
            items: vec![SaleLine {
                product_id: product_id.to_string(),
                quantity,
                unit_price_cents: 1000,
                discount_bps: None,
            }],
            tax_included: Some(false),
            tax_rate: Some(rate),
            acting_user_id: user_id.to_string(),
        }
    }

    /// Two cashiers with one sale each: 3570 (Ana) then 1000 (Ben).
    async fn shop() -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();
        let ana = users.create("ana", "Ana", Role::Cashier).await.unwrap().id;
        let ben = users.create("ben", "Ben", Role::Cashier).await.unwrap().id;
        let boss = users.create("boss", "Boss", Role::Manager).await.unwrap().id;

        let drinks = db.categories().create("Drinks").await.unwrap();
        let cola = db
            .products()
            .create(NewProduct::new("COKE-330", "Coca-Cola", 1000).category(&drinks.id).stock(10))
            .await
            .unwrap();

        let (sink, worker) = AuditDispatcher::spawn(&db, 16);
        let engine = SaleEngine::new(db.clone(), Arc::new(sink));
        let ana_sale = engine
            .create_sale(sale(&ana, &cola.id, 3, TaxRate::from_bps(1900)))
            .await
            .unwrap();
        let ben_sale = engine
            .create_sale(sale(&ben, &cola.id, 1, TaxRate::zero()))
            .await
            .unwrap();
        worker.shutdown().await;

        Shop {
            reports: ReportService::new(db),
            ana,
            ben,
            boss,
            ana_sale,
            ben_sale,
        }
    }

    fn ids(sales: &[SaleDetail]) -> Vec<&str> {
        sales.iter().map(|s| s.sale.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_role_narrowing() {
        let shop = shop().await;

        // Cashier asking for someone else still sees only their own sales.
        let own = shop
            .reports
            .list_sales(&SalesFilter::new(Role::Cashier, &shop.ana).target_user(&shop.ben))
            .await
            .unwrap();
        assert_eq!(ids(&own), vec![shop.ana_sale.sale.id.as_str()]);

        let all = shop
            .reports
            .list_sales(&SalesFilter::new(Role::Manager, &shop.boss))
            .await
            .unwrap();
        assert_eq!(
            ids(&all),
            vec![shop.ben_sale.sale.id.as_str(), shop.ana_sale.sale.id.as_str()]
        );

        let bens = shop
            .reports
            .list_sales(&SalesFilter::new(Role::Admin, &shop.boss).target_user(&shop.ben))
            .await
            .unwrap();
        assert_eq!(ids(&bens), vec![shop.ben_sale.sale.id.as_str()]);
    }

    #[tokio::test]
    async fn test_get_sale_visibility() {
        let shop = shop().await;
        let ben_sale_id = shop.ben_sale.sale.id.as_str();

        let err = shop
            .reports
            .get_sale(ben_sale_id, Role::Cashier, &shop.ana)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::not_found("Sale", ben_sale_id));

        let detail = shop
            .reports
            .get_sale(ben_sale_id, Role::Cashier, &shop.ben)
            .await
            .unwrap();
        assert_eq!(detail.sale.total_cents, 1000);

        assert!(shop.reports.get_sale(ben_sale_id, Role::Manager, &shop.boss).await.is_ok());

        let err = shop
            .reports
            .get_sale("nope", Role::Admin, &shop.boss)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::not_found("Sale", "nope"));
    }

    #[tokio::test]
    async fn test_date_bounds_are_inclusive_days() {
        let shop = shop().await;
        let day = shop.ana_sale.sale.created_at.date_naive();

        let same_day = shop
            .reports
            .list_sales(&SalesFilter::new(Role::Manager, &shop.boss).with_dates(day, day))
            .await
            .unwrap();
        assert!(same_day.iter().any(|s| s.sale.id == shop.ana_sale.sale.id));

        let yesterday = day.pred_opt().unwrap();
        let before = shop
            .reports
            .list_sales(&SalesFilter::new(Role::Manager, &shop.boss).with_dates(yesterday, yesterday))
            .await
            .unwrap();
        assert!(before.is_empty());
    }

    #[test]
    fn test_with_dates_covers_whole_days() {
        let from = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let filter = SalesFilter::new(Role::Admin, "u").with_dates(from, to);

        assert_eq!(filter.start.unwrap().to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert_eq!(
            filter.end.unwrap().to_rfc3339(),
            "2024-06-02T23:59:59.999999999+00:00"
        );
    }

    #[tokio::test]
    async fn test_summary_of_one_day() {
        let shop = shop().await;

        let days = shop
            .reports
            .summarize_sales(&SalesFilter::new(Role::Manager, &shop.boss))
            .await
            .unwrap();

        assert_eq!(days.len(), 1);
        let day = &days[0];
        assert_eq!(day.sales_count, 2);
        assert_eq!(day.total_amount_cents, 4570);
        assert_eq!(day.top_products[0].quantity, 4);
        assert_eq!(day.top_categories[0].name, "Drinks");
        assert_eq!(day.by_user[0].user_id, shop.ana);
        assert_eq!(day.by_user[0].amount_cents, 3570);

        // Cashier summary only counts their own sale.
        let own = shop
            .reports
            .summarize_sales(&SalesFilter::new(Role::Cashier, &shop.ben))
            .await
            .unwrap();
        assert_eq!(own.iter().map(|d| d.total_amount_cents).sum::<i64>(), 1000);
    }

    #[tokio::test]
    async fn test_stats_require_elevated_role() {
        let shop = shop().await;

        let err = shop.reports.get_sales_stats(Role::Cashier).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let stats = shop.reports.get_sales_stats(Role::Admin).await.unwrap();
        assert_eq!(stats.total_sales.count, 2);
        assert_eq!(stats.total_sales.amount_cents, 4570);
        assert_eq!(stats.sales_by_user.len(), 2);
        assert_eq!(stats.sales_by_user[0].user_id, shop.ana);
    }

    #[tokio::test]
    async fn test_stats_windows_follow_now() {
        let shop = shop().await;

        let now = shop.ben_sale.sale.created_at;
        let stats = shop.reports.sales_stats_at(Role::Manager, &now).await.unwrap();
        assert_eq!(stats.today_sales.count, 2);
        assert_eq!(stats.month_sales.amount_cents, 4570);

        // Forty days on, both windows have moved past the sales.
        let later = now + Duration::days(40);
        let stats = shop.reports.sales_stats_at(Role::Manager, &later).await.unwrap();
        assert_eq!(stats.today_sales, Default::default());
        assert_eq!(stats.month_sales, Default::default());
        assert_eq!(stats.total_sales.count, 2);
    }
}
