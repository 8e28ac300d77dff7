//! Sales reports over the ledger
//!
//! Cancelled orders count toward status totals but never toward revenue,
//! averages or rankings.

use bazaar_catalog::ListingRepository;
use bazaar_common::{ListingId, MarketResult, TenantId};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::order::{Order, OrderStatus, PaymentMethod};
use crate::repository::OrderRepository;

const UNKNOWN_CASHIER: &str = "Unknown";
const UNPAID: &str = "PENDING";

/// Orders and revenue for one cashier and payment method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySalesSummary {
    /// Staff member, or "Unknown"
    pub cashier: String,
    /// Settlement method; unpaid orders count as cash
    pub payment_method: PaymentMethod,
    /// Orders in the group
    pub orders: usize,
    /// Sum of order totals
    pub revenue: Decimal,
}

/// Units sold of one listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopSeller {
    /// Listing
    pub listing_id: ListingId,
    /// Most recent name on an order line
    pub name: String,
    /// Units sold
    pub quantity: u64,
}

/// Seller dashboard figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Listings in the store
    pub total_listings: usize,
    /// Listings at or below their minimum stock
    pub low_stock: usize,
    /// Revenue of `today`
    pub revenue_today: Decimal,
    /// Orders placed `today`
    pub orders_today: usize,
    /// Revenue of the day before
    pub revenue_yesterday: Decimal,
    /// Day-over-day change in percent, one decimal
    pub revenue_growth: Decimal,
    /// Catalog margin in percent, two decimals
    pub average_margin: Decimal,
    /// Order counts per status
    pub orders_by_status: BTreeMap<OrderStatus, usize>,
    /// Every order ever placed
    pub total_orders: usize,
    /// Revenue per non-cancelled order, two decimals
    pub average_order_value: Decimal,
    /// Order counts per payment method, "PENDING" for unpaid
    pub payment_methods: BTreeMap<String, usize>,
    /// Best seller by units
    pub top_seller: Option<TopSeller>,
}

/// Cross-tenant marketplace activity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformActivity {
    /// Sum of non-cancelled order totals
    pub gross_merchandise_value: Decimal,
    /// Non-cancelled orders
    pub orders: usize,
    /// Tenants with at least one such order
    pub active_shops: usize,
}

/// Read-only reporting
pub struct SalesReports {
    orders: Arc<dyn OrderRepository>,
    listings: Arc<dyn ListingRepository>,
}

impl SalesReports {
    /// Create reports
    pub fn new(orders: Arc<dyn OrderRepository>, listings: Arc<dyn ListingRepository>) -> Self {
        Self { orders, listings }
    }

    /// Orders of `day` grouped by cashier and payment method
    pub fn daily_summary(&self, tenant_id: &TenantId, day: NaiveDate) -> MarketResult<Vec<DailySalesSummary>> {
        let (from, to) = day_bounds(day);
        let orders = self.orders.find_by_tenant_between(tenant_id, from, to)?;

        let mut groups: BTreeMap<(String, PaymentMethod), (usize, Decimal)> = BTreeMap::new();
        for order in orders.iter().filter(|o| counts_as_sale(o)) {
            let cashier = order
                .cashier
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_CASHIER.to_string());
            let method = order.payment_method.unwrap_or(PaymentMethod::Cash);
            let slot = groups.entry((cashier, method)).or_insert((0, Decimal::ZERO));
            slot.0 += 1;
            slot.1 += order.total_amount;
        }

        Ok(groups
            .into_iter()
            .map(|((cashier, payment_method), (orders, revenue))| DailySalesSummary {
                cashier,
                payment_method,
                orders,
                revenue,
            })
            .collect())
    }

    /// Listings ranked by units sold, descending
    pub fn top_selling(&self, tenant_id: &TenantId, limit: usize) -> MarketResult<Vec<TopSeller>> {
        let orders = self.orders.find_by_tenant(tenant_id)?;
        Ok(rank(&orders, limit))
    }

    /// Dashboard for `today` (UTC)
    pub fn dashboard(&self, tenant_id: &TenantId, today: NaiveDate) -> MarketResult<Dashboard> {
        let listings = self.listings.find_by_tenant(tenant_id)?;
        let orders = self.orders.find_by_tenant(tenant_id)?;

        let mut profit = Decimal::ZERO;
        let mut potential = Decimal::ZERO;
        for listing in listings.iter().filter(|l| l.price > Decimal::ZERO) {
            profit += listing.price - listing.cost_price;
            potential += listing.price;
        }
        let average_margin = percent(profit, potential, 2);

        let (today_from, today_to) = day_bounds(today);
        let (yesterday_from, _) = day_bounds(today - Duration::days(1));
        let today_orders: Vec<&Order> = orders
            .iter()
            .filter(|o| o.created_at >= today_from && o.created_at < today_to)
            .collect();
        let revenue_today = revenue(today_orders.iter().copied());
        let revenue_yesterday = revenue(
            orders
                .iter()
                .filter(|o| o.created_at >= yesterday_from && o.created_at < today_from),
        );
        let revenue_growth = if revenue_yesterday > Decimal::ZERO {
            percent(revenue_today - revenue_yesterday, revenue_yesterday, 1)
        } else if revenue_today > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let mut orders_by_status: BTreeMap<OrderStatus, usize> =
            OrderStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut payment_methods: BTreeMap<String, usize> = BTreeMap::new();
        for order in &orders {
            *orders_by_status.entry(order.status).or_default() += 1;
            let method = order.payment_method.map_or(UNPAID, |m| m.as_str());
            *payment_methods.entry(method.to_string()).or_default() += 1;
        }

        let sales = orders.iter().filter(|o| counts_as_sale(o)).count();
        let average_order_value = if sales > 0 {
            round(revenue(orders.iter()) / Decimal::from(sales), 2)
        } else {
            Decimal::ZERO
        };

        Ok(Dashboard {
            total_listings: listings.len(),
            low_stock: listings.iter().filter(|l| l.is_low_stock()).count(),
            revenue_today,
            orders_today: today_orders.len(),
            revenue_yesterday,
            revenue_growth,
            average_margin,
            orders_by_status,
            total_orders: orders.len(),
            average_order_value,
            payment_methods,
            top_seller: rank(&orders, 1).into_iter().next(),
        })
    }

    /// Marketplace-wide sales since `since`
    pub fn platform_activity(&self, since: DateTime<Utc>) -> MarketResult<PlatformActivity> {
        let orders = self.orders.find_since(since)?;
        let sales: Vec<&Order> = orders.iter().filter(|o| counts_as_sale(o)).collect();
        let shops: HashSet<TenantId> = sales.iter().map(|o| o.tenant_id).collect();
        Ok(PlatformActivity {
            gross_merchandise_value: revenue(sales.iter().copied()),
            orders: sales.len(),
            active_shops: shops.len(),
        })
    }
}

fn counts_as_sale(order: &Order) -> bool {
    order.status != OrderStatus::Cancelled
}

fn revenue<'a>(orders: impl Iterator<Item = &'a Order>) -> Decimal {
    orders.filter(|o| counts_as_sale(o)).map(|o| o.total_amount).sum()
}

fn rank(orders: &[Order], limit: usize) -> Vec<TopSeller> {
    // Orders arrive newest first, so the first name seen is the latest
    let mut totals: HashMap<ListingId, TopSeller> = HashMap::new();
    for order in orders.iter().filter(|o| counts_as_sale(o)) {
        for line in &order.lines {
            totals
                .entry(line.listing_id)
                .or_insert_with(|| TopSeller {
                    listing_id: line.listing_id,
                    name: line.name.clone(),
                    quantity: 0,
                })
                .quantity += u64::from(line.quantity);
        }
    }

    let mut ranked: Vec<TopSeller> = totals.into_values().collect();
    ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

fn percent(part: Decimal, whole: Decimal, dp: u32) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round(part / whole * Decimal::ONE_HUNDRED, dp)
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
