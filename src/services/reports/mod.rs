//! Admin report aggregation. Each section reads its records for the window
//! through a [`ReportSource`] and reduces them in memory.

pub mod finance;
pub mod logistics;
pub mod orders;
pub mod period;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::{error::AppResult, models::DateRange, repository::report_store::ReportSource};

use self::{
    finance::{summarize_finance, FinancialReport},
    logistics::{summarize_logistics, transport_mode_filter, LogisticsReport},
    orders::{
        summarize_orders, AgentPerformance, DeliveryTimeDistribution, MonthlyTrend, OrderKpis,
        StatusDistribution,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Overview,
    Performance,
    Financial,
    Logistics,
    Unknown,
}

impl ReportType {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::Overview;
        };
        match raw.to_ascii_lowercase().as_str() {
            "overview" => Self::Overview,
            "performance" => Self::Performance,
            "financial" => Self::Financial,
            "logistics" => Self::Logistics,
            _ => Self::Unknown,
        }
    }

    fn includes_orders(self) -> bool {
        matches!(self, Self::Overview | Self::Performance)
    }

    fn includes_finance(self) -> bool {
        matches!(self, Self::Overview | Self::Financial)
    }

    fn includes_logistics(self) -> bool {
        matches!(self, Self::Overview | Self::Logistics)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilters {
    pub region: Option<String>,
    pub service: Option<String>,
}

impl ReportFilters {
    /// `all` and blank values mean no filter.
    pub fn new(region: Option<&str>, service: Option<&str>) -> Self {
        Self {
            region: filter_value(region),
            service: filter_value(service),
        }
    }
}

fn filter_value(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
        .map(ToOwned::to_owned)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub period: ReportPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpis: Option<OrderKpis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_distribution: Option<StatusDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_performance: Option<Vec<AgentPerformance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_trends: Option<Vec<MonthlyTrend>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_time_distribution: Option<DeliveryTimeDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial: Option<FinancialReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logistics: Option<LogisticsReport>,
}

impl ReportData {
    fn empty(range: &DateRange) -> Self {
        Self {
            period: ReportPeriod {
                from: range.from,
                to: range.to,
            },
            kpis: None,
            status_distribution: None,
            agent_performance: None,
            monthly_trends: None,
            delivery_time_distribution: None,
            financial: None,
            logistics: None,
        }
    }
}

/// Builds one report per call. Holds no state between requests.
pub struct ReportAggregator<'a, S> {
    source: &'a S,
    now: DateTime<Utc>,
}

impl<'a, S: ReportSource> ReportAggregator<'a, S> {
    /// `now` is the clock used for overdue checks.
    pub fn at(source: &'a S, now: DateTime<Utc>) -> Self {
        Self { source, now }
    }

    pub async fn build(
        &self,
        report_type: ReportType,
        range: DateRange,
        filters: &ReportFilters,
    ) -> AppResult<ReportData> {
        let region = filters.region.as_deref();
        let service = filters.service.as_deref();
        let mut data = ReportData::empty(&range);

        if report_type.includes_orders() {
            let orders = self.source.orders(&range, region, service).await?;
            let report = summarize_orders(&orders, &range);
            data.kpis = Some(report.kpis);
            data.status_distribution = Some(report.status_distribution);
            data.agent_performance = Some(report.agent_performance);
            data.monthly_trends = Some(report.monthly_trends);
            data.delivery_time_distribution = Some(report.delivery_time_distribution);
        }

        if report_type.includes_finance() {
            let invoices = self.source.invoices(&range, service).await?;
            let payments = self.source.payments(&range).await?;
            data.financial = Some(summarize_finance(&invoices, &payments, &range, self.now));
        }

        if report_type.includes_logistics() {
            let mode = transport_mode_filter(service);
            let shipments = self.source.shipments(&range, region, mode).await?;
            let incidents = self.source.incidents(&range).await?;
            data.logistics = Some(summarize_logistics(&shipments, &incidents));
        }

        Ok(data)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole` in percent, clamped to `[0, 100]`. Zero when `whole` is not
/// positive.
pub(crate) fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !part.is_finite() || !whole.is_finite() {
        return 0.0;
    }
    round2((part / whole * 100.0).clamp(0.0, 100.0))
}

/// A calendar month overlapping a report window, clipped to that window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MonthBucket {
    /// `YYYY-MM`
    pub key: String,
    /// e.g. `Jan 2026`
    pub label: String,
    window: DateRange,
}

impl MonthBucket {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.window.contains(at)
    }
}

/// Every calendar month from the one holding `from` to the one holding `to`.
pub(crate) fn months_spanning(range: &DateRange) -> Vec<MonthBucket> {
    let (Some(mut cursor), Some(last)) = (
        first_of_month(range.from),
        first_of_month(range.to),
    ) else {
        return Vec::new();
    };

    let mut months = Vec::new();
    while cursor <= last {
        let Some(next) = cursor.checked_add_months(Months::new(1)) else {
            break;
        };
        let month_start = cursor.and_time(NaiveTime::default()).and_utc();
        let month_end = next.and_time(NaiveTime::default()).and_utc() - Duration::milliseconds(1);
        months.push(MonthBucket {
            key: cursor.format("%Y-%m").to_string(),
            label: cursor.format("%b %Y").to_string(),
            window: DateRange {
                from: month_start.max(range.from),
                to: month_end.min(range.to),
            },
        });
        cursor = next;
    }
    months
}

fn first_of_month(at: DateTime<Utc>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{
        months_spanning, percentage, ReportAggregator, ReportData, ReportFilters, ReportType,
    };
    use crate::{
        error::{AppError, AppResult},
        models::{
            DateRange, Incident, IncidentType, Invoice, Order, OrderStatus, Payment,
            PaymentMethod, Shipment, TransportMode,
        },
        repository::report_store::ReportSource,
    };
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(Default)]
    struct MemoryStore {
        orders: Vec<Order>,
        invoices: Vec<Invoice>,
        payments: Vec<Payment>,
        shipments: Vec<Shipment>,
        incidents: Vec<Incident>,
        fail_payments: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MemoryStore {
        fn record(&self, call: &'static str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl ReportSource for MemoryStore {
        async fn orders(
            &self,
            range: &DateRange,
            _region: Option<&str>,
            _service: Option<&str>,
        ) -> AppResult<Vec<Order>> {
            self.record("orders");
            Ok(self
                .orders
                .iter()
                .filter(|order| range.contains(order.created_at))
                .cloned()
                .collect())
        }

        async fn invoices(
            &self,
            range: &DateRange,
            _service: Option<&str>,
        ) -> AppResult<Vec<Invoice>> {
            self.record("invoices");
            Ok(self
                .invoices
                .iter()
                .filter(|invoice| range.contains(invoice.created_at))
                .cloned()
                .collect())
        }

        async fn payments(&self, _range: &DateRange) -> AppResult<Vec<Payment>> {
            self.record("payments");
            if self.fail_payments {
                return Err(AppError::Dependency("Database operation failed.".to_string()));
            }
            Ok(self.payments.clone())
        }

        async fn shipments(
            &self,
            _range: &DateRange,
            _region: Option<&str>,
            mode: Option<TransportMode>,
        ) -> AppResult<Vec<Shipment>> {
            self.record("shipments");
            Ok(self
                .shipments
                .iter()
                .filter(|shipment| mode.map_or(true, |mode| shipment.transport_mode == mode))
                .cloned()
                .collect())
        }

        async fn incidents(&self, _range: &DateRange) -> AppResult<Vec<Incident>> {
            self.record("incidents");
            Ok(self.incidents.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap()
    }

    fn january() -> DateRange {
        DateRange {
            from: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            to: now(),
        }
    }

    fn day(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap()
    }

    fn seeded_store() -> MemoryStore {
        MemoryStore {
            orders: vec![Order {
                created_at: day(5),
                updated_at: day(6),
                status: Some(OrderStatus::Delivered),
                agent: None,
                pickup_date: Some(day(5)),
                expected_delivery_date: Some(day(8)),
                delivered_at: Some(day(6)),
            }],
            invoices: vec![Invoice {
                id: "inv-1".to_string(),
                amount: 100.0,
                stored_status: None,
                created_at: day(6),
                due_date: None,
                service_type: Some("Maritime".to_string()),
                client: None,
                payment_amounts: vec![100.0],
            }],
            payments: vec![
                Payment {
                    amount: 100.0,
                    method: PaymentMethod::Card,
                },
                Payment {
                    amount: 50.0,
                    method: PaymentMethod::Cash,
                },
            ],
            shipments: vec![Shipment {
                region: Some("Dakar".to_string()),
                transport_mode: TransportMode::Sea,
                distance_km: Some(40.0),
                warehouse: None,
            }],
            incidents: vec![Incident {
                incident_type: IncidentType::Delay,
            }],
            ..MemoryStore::default()
        }
    }

    async fn build(store: &MemoryStore, report_type: ReportType) -> AppResult<ReportData> {
        ReportAggregator::at(store, now())
            .build(report_type, january(), &ReportFilters::default())
            .await
    }

    #[test]
    fn report_type_defaults_to_overview() {
        assert_eq!(ReportType::parse(None), ReportType::Overview);
        assert_eq!(ReportType::parse(Some("  ")), ReportType::Overview);
        assert_eq!(ReportType::parse(Some("Financial")), ReportType::Financial);
        assert_eq!(ReportType::parse(Some("audit")), ReportType::Unknown);
    }

    #[test]
    fn all_means_no_filter() {
        let filters = ReportFilters::new(Some("ALL"), Some(" Maritime "));
        assert_eq!(filters.region, None);
        assert_eq!(filters.service.as_deref(), Some("Maritime"));
        assert_eq!(ReportFilters::new(Some(""), None), ReportFilters::default());
    }

    #[test]
    fn percentage_is_bounded_and_never_nan() {
        assert_eq!(percentage(1.0, 0.0), 0.0);
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(150.0, 100.0), 100.0);
        assert_eq!(percentage(-5.0, 100.0), 0.0);
        assert_eq!(percentage(1.0, 3.0), 33.33);
    }

    #[test]
    fn months_are_listed_in_order() {
        let range = DateRange {
            from: Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        };
        let months = months_spanning(&range);
        let keys = months.iter().map(|month| month.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["2025-12", "2026-01", "2026-02"]);
        assert_eq!(months[1].label, "Jan 2026");
        // Clipped to the window.
        assert!(!months[0].contains(Utc.with_ymd_and_hms(2025, 12, 15, 0, 0, 0).unwrap()));
        assert!(months[0].contains(Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap()));
        assert!(!months[2].contains(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 1).unwrap()));

        let inverted = DateRange {
            from: range.to,
            to: range.from,
        };
        assert!(months_spanning(&inverted).is_empty());
    }

    #[tokio::test]
    async fn overview_runs_every_section() {
        let store = seeded_store();
        let data = build(&store, ReportType::Overview).await.unwrap();

        assert_eq!(data.kpis.as_ref().map(|kpis| kpis.total_orders), Some(1));
        assert!(data.status_distribution.is_some());
        assert!(data.monthly_trends.is_some());
        let financial = data.financial.as_ref().unwrap();
        assert_eq!(financial.paid_amount, 100.0);
        assert_eq!(financial.unpaid_amount, 0.0);
        assert_eq!(financial.payment_rate, 100.0);
        let logistics = data.logistics.as_ref().unwrap();
        assert_eq!(logistics.total_shipments, 1);
        assert_eq!(logistics.incident_count, 1);
        assert_eq!(
            store.calls(),
            vec!["orders", "invoices", "payments", "shipments", "incidents"]
        );
    }

    #[tokio::test]
    async fn single_type_runs_only_its_section() {
        let store = seeded_store();
        let data = build(&store, ReportType::Financial).await.unwrap();

        assert!(data.kpis.is_none());
        assert!(data.logistics.is_none());
        let shares = &data.financial.as_ref().unwrap().payment_method_distribution;
        let sum = shares.iter().map(|share| share.percentage).sum::<f64>();
        assert!((sum - 100.0).abs() < 0.05);
        assert_eq!(store.calls(), vec!["invoices", "payments"]);

        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("financial").is_some());
        assert!(json.get("kpis").is_none());
    }

    #[tokio::test]
    async fn unknown_type_only_echoes_the_period() {
        let store = seeded_store();
        let data = build(&store, ReportType::Unknown).await.unwrap();

        assert!(store.calls().is_empty());
        let json = serde_json::to_value(&data).unwrap();
        let keys = json.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["period".to_string()]);
    }

    #[tokio::test]
    async fn service_filter_narrows_shipments_by_transport_mode() {
        let mut store = seeded_store();
        let mut by_air = store.shipments[0].clone();
        by_air.transport_mode = TransportMode::Air;
        store.shipments.push(by_air);

        let express = ReportFilters::new(None, Some("Express"));
        let data = ReportAggregator::at(&store, now())
            .build(ReportType::Logistics, january(), &express)
            .await
            .unwrap();
        let logistics = data.logistics.unwrap();
        assert_eq!(logistics.total_shipments, 1);
        assert_eq!(logistics.transport_modes[0].mode, "air");

        let storage = ReportFilters::new(None, Some("entreposage"));
        let data = ReportAggregator::at(&store, now())
            .build(ReportType::Logistics, january(), &storage)
            .await
            .unwrap();
        assert_eq!(data.logistics.unwrap().total_shipments, 2);
    }

    #[tokio::test]
    async fn a_failing_query_fails_the_whole_report() {
        let store = MemoryStore {
            fail_payments: true,
            ..seeded_store()
        };
        let result = build(&store, ReportType::Overview).await;
        assert!(matches!(result, Err(AppError::Dependency(_))));
        assert!(!store.calls().contains(&"shipments"));
    }

    #[tokio::test]
    async fn empty_store_yields_zeroed_sections() {
        let store = MemoryStore::default();
        let data = build(&store, ReportType::Overview).await.unwrap();

        let kpis = data.kpis.unwrap();
        assert_eq!(kpis.on_time_rate, 0.0);
        assert_eq!(kpis.avg_delivery_time, 0.0);
        assert_eq!(data.agent_performance, Some(Vec::new()));
        let financial = data.financial.unwrap();
        assert_eq!(financial.payment_rate, 0.0);
        assert!(financial.payment_method_distribution.is_empty());
    }
}
