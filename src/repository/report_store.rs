use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        DateRange, Incident, IncidentType, Invoice, InvoiceStatus, Order, OrderStatus, PartyRef,
        Payment, PaymentMethod, Shipment, TransportMode,
    },
};

/// Upper bound on rows a single report section reads. One extra row is
/// fetched so an overflowing window fails instead of being cut short.
const MAX_REPORT_ROWS: i64 = 50_000;

/// Mirrors the accent folding applied to codes in Rust, one character each.
const FOLD_FROM: &str = "éèêëàâäîïôöùûüç -";
const FOLD_TO: &str = "eeeeaaaiioouuuc__";

/// Read access to the records reports are computed from. Every record
/// returned has already been translated into the canonical vocabularies.
pub trait ReportSource: Send + Sync {
    fn orders(
        &self,
        range: &DateRange,
        region: Option<&str>,
        service: Option<&str>,
    ) -> impl Future<Output = AppResult<Vec<Order>>> + Send;

    fn invoices(
        &self,
        range: &DateRange,
        service: Option<&str>,
    ) -> impl Future<Output = AppResult<Vec<Invoice>>> + Send;

    fn payments(&self, range: &DateRange) -> impl Future<Output = AppResult<Vec<Payment>>> + Send;

    fn shipments(
        &self,
        range: &DateRange,
        region: Option<&str>,
        mode: Option<TransportMode>,
    ) -> impl Future<Output = AppResult<Vec<Shipment>>> + Send;

    fn incidents(&self, range: &DateRange)
        -> impl Future<Output = AppResult<Vec<Incident>>> + Send;
}

#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Headline counters for the admin dashboard. The queries are independent
    /// and run concurrently.
    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let pool = &self.pool;
        let (status_rows, total_clients, total_agents, total_revenue, open_complaints, unread) =
            tokio::try_join!(
                sqlx::query(
                    "SELECT COALESCE(status::text, '') AS status, COUNT(*)::bigint AS total
                     FROM orders
                     GROUP BY 1",
                )
                .fetch_all(pool),
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*)::bigint FROM users WHERE lower(role::text) = 'client'",
                )
                .fetch_one(pool),
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*)::bigint FROM users WHERE lower(role::text) = 'agent'",
                )
                .fetch_one(pool),
                sqlx::query_scalar::<_, f64>(
                    "SELECT COALESCE(SUM(amount), 0)::float8 FROM payments",
                )
                .fetch_one(pool),
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*)::bigint
                     FROM complaints
                     WHERE lower(status::text) NOT IN ('resolved', 'closed', 'résolue', 'fermée')",
                )
                .fetch_one(pool),
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*)::bigint FROM notifications WHERE is_read = false",
                )
                .fetch_one(pool),
            )?;

        let counts = status_rows
            .iter()
            .map(|row| -> Result<(String, i64), sqlx::Error> {
                Ok((row.try_get("status")?, row.try_get("total")?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DashboardStats::from_status_counts(
            &counts,
            total_clients,
            total_agents,
            total_revenue,
            open_complaints,
            unread,
        ))
    }
}

impl ReportSource for PgReportStore {
    async fn orders(
        &self,
        range: &DateRange,
        region: Option<&str>,
        service: Option<&str>,
    ) -> AppResult<Vec<Order>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT row_to_json(t) AS row FROM (
               SELECT o.status::text AS status, o.created_at, o.updated_at,
                      o.pickup_date::timestamptz AS pickup_date,
                      o.expected_delivery_date::timestamptz AS expected_delivery_date,
                      o.delivered_at,
                      o.agent_id::text AS agent_id, a.full_name AS agent_name
               FROM orders o
               LEFT JOIN users a ON a.id = o.agent_id
               WHERE 1=1",
        );
        push_window(&mut query, "o.created_at", range);
        push_text_filter(&mut query, "o.region", region);
        push_text_filter(&mut query, "o.service_type", service);
        push_tail(&mut query, "o.created_at");

        let rows = query.build().fetch_all(&self.pool).await?;
        let orders = decode_rows::<OrderRow>(rows, "orders")?
            .into_iter()
            .map(OrderRow::into_order)
            .collect();
        Ok(orders)
    }

    async fn invoices(&self, range: &DateRange, service: Option<&str>) -> AppResult<Vec<Invoice>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT row_to_json(t) AS row FROM (
               SELECT i.id::text AS id, i.amount, i.status::text AS status,
                      i.created_at, i.due_date::timestamptz AS due_date,
                      o.service_type,
                      o.client_id::text AS client_id, c.full_name AS client_name,
                      COALESCE(
                        (SELECT json_agg(p.amount) FROM payments p WHERE p.invoice_id = i.id),
                        '[]'::json
                      ) AS payment_amounts
               FROM invoices i
               LEFT JOIN orders o ON o.id = i.order_id
               LEFT JOIN users c ON c.id = o.client_id
               WHERE 1=1",
        );
        push_window(&mut query, "i.created_at", range);
        push_text_filter(&mut query, "o.service_type", service);
        push_tail(&mut query, "i.created_at");

        let rows = query.build().fetch_all(&self.pool).await?;
        let invoices = decode_rows::<InvoiceRow>(rows, "invoices")?
            .into_iter()
            .map(InvoiceRow::into_invoice)
            .collect();
        Ok(invoices)
    }

    async fn payments(&self, range: &DateRange) -> AppResult<Vec<Payment>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT row_to_json(t) AS row FROM (
               SELECT p.amount, p.method::text AS method
               FROM payments p
               WHERE 1=1",
        );
        push_window(&mut query, "p.created_at", range);
        push_tail(&mut query, "p.created_at");

        let rows = query.build().fetch_all(&self.pool).await?;
        let payments = decode_rows::<PaymentRow>(rows, "payments")?
            .into_iter()
            .map(|row| Payment {
                amount: row.amount.unwrap_or(0.0),
                method: PaymentMethod::from_code(row.method.as_deref().unwrap_or_default()),
            })
            .collect();
        Ok(payments)
    }

    async fn shipments(
        &self,
        range: &DateRange,
        region: Option<&str>,
        mode: Option<TransportMode>,
    ) -> AppResult<Vec<Shipment>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT row_to_json(t) AS row FROM (
               SELECT s.region, s.transport_mode::text AS transport_mode,
                      s.distance::float8 AS distance,
                      w.id::text AS warehouse_id, w.name AS warehouse_name
               FROM shipments s
               LEFT JOIN warehouses w ON w.id = s.warehouse_id
               WHERE 1=1",
        );
        push_window(&mut query, "s.created_at", range);
        push_text_filter(&mut query, "s.region", region);
        if let Some(mode) = mode {
            push_code_filter(&mut query, "s.transport_mode", mode.codes());
        }
        push_tail(&mut query, "s.created_at");

        let rows = query.build().fetch_all(&self.pool).await?;
        let shipments = decode_rows::<ShipmentRow>(rows, "shipments")?
            .into_iter()
            .map(|row| Shipment {
                region: non_empty(row.region),
                transport_mode: TransportMode::from_code(
                    row.transport_mode.as_deref().unwrap_or_default(),
                ),
                distance_km: row.distance.filter(|value| value.is_finite()),
                warehouse: party(row.warehouse_id, row.warehouse_name),
            })
            .collect();
        Ok(shipments)
    }

    async fn incidents(&self, range: &DateRange) -> AppResult<Vec<Incident>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT row_to_json(t) AS row FROM (
               SELECT n.type::text AS incident_type
               FROM incidents n
               WHERE 1=1",
        );
        push_window(&mut query, "n.created_at", range);
        push_tail(&mut query, "n.created_at");

        let rows = query.build().fetch_all(&self.pool).await?;
        let incidents = decode_rows::<IncidentRow>(rows, "incidents")?
            .into_iter()
            .map(|row| Incident {
                incident_type: IncidentType::from_code(
                    row.incident_type.as_deref().unwrap_or_default(),
                ),
            })
            .collect();
        Ok(incidents)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub in_progress_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub total_clients: i64,
    pub total_agents: i64,
    pub total_revenue: f64,
    pub open_complaints: i64,
    pub unread_notifications: i64,
}

impl DashboardStats {
    fn from_status_counts(
        counts: &[(String, i64)],
        total_clients: i64,
        total_agents: i64,
        total_revenue: f64,
        open_complaints: i64,
        unread_notifications: i64,
    ) -> Self {
        let mut stats = Self {
            total_clients,
            total_agents,
            total_revenue: (total_revenue * 100.0).round() / 100.0,
            open_complaints,
            unread_notifications,
            ..Self::default()
        };
        for (status, total) in counts {
            stats.total_orders += total;
            match OrderStatus::from_code(status) {
                Some(OrderStatus::Pending) => stats.pending_orders += total,
                Some(OrderStatus::InProgress) => stats.in_progress_orders += total,
                Some(OrderStatus::Delivered) => stats.delivered_orders += total,
                Some(OrderStatus::Cancelled) => stats.cancelled_orders += total,
                None => {}
            }
        }
        stats
    }
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    #[serde(default)]
    status: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pickup_date: Option<DateTime<Utc>>,
    #[serde(default)]
    expected_delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    agent_name: Option<String>,
}

impl OrderRow {
    fn into_order(self) -> Order {
        let raw_status = self.status.unwrap_or_default();
        let status = OrderStatus::from_code(&raw_status);
        if status.is_none() {
            tracing::warn!(status = %raw_status, "Order has an unrecognised status code");
        }
        Order {
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            status,
            agent: party(self.agent_id, self.agent_name),
            pickup_date: self.pickup_date,
            expected_delivery_date: self.expected_delivery_date,
            delivered_at: self.delivered_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvoiceRow {
    id: String,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    service_type: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    payment_amounts: Vec<Option<f64>>,
}

impl InvoiceRow {
    fn into_invoice(self) -> Invoice {
        Invoice {
            id: self.id,
            amount: self.amount.unwrap_or(0.0),
            stored_status: self.status.as_deref().and_then(InvoiceStatus::from_code),
            created_at: self.created_at,
            due_date: self.due_date,
            service_type: non_empty(self.service_type),
            client: party(self.client_id, self.client_name),
            payment_amounts: self.payment_amounts.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShipmentRow {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    transport_mode: Option<String>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    warehouse_id: Option<String>,
    #[serde(default)]
    warehouse_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncidentRow {
    #[serde(default)]
    incident_type: Option<String>,
}

fn push_window(query: &mut QueryBuilder<Postgres>, column: &str, range: &DateRange) {
    query
        .push(" AND ")
        .push(column)
        .push(" >= ")
        .push_bind(range.from)
        .push(" AND ")
        .push(column)
        .push(" <= ")
        .push_bind(range.to);
}

fn push_text_filter(query: &mut QueryBuilder<Postgres>, column: &str, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return;
    };
    query
        .push(" AND lower(")
        .push(column)
        .push("::text) = lower(")
        .push_bind(value.to_string())
        .push(")");
}

/// Matches the column, folded the way `models` folds codes, against any of
/// the given folded codes.
fn push_code_filter(query: &mut QueryBuilder<Postgres>, column: &str, codes: &[&str]) {
    query
        .push(" AND translate(lower(trim(")
        .push(column)
        .push("::text)), '")
        .push(FOLD_FROM)
        .push("', '")
        .push(FOLD_TO)
        .push("') = ANY(")
        .push_bind(codes.iter().map(|code| code.to_string()).collect::<Vec<_>>())
        .push(")");
}

fn push_tail(query: &mut QueryBuilder<Postgres>, order_column: &str) {
    query
        .push(" ORDER BY ")
        .push(order_column)
        .push(" ASC LIMIT ")
        .push_bind(MAX_REPORT_ROWS + 1)
        .push(") t");
}

fn ensure_within_cap(len: usize, table: &str) -> AppResult<()> {
    if len as i64 > MAX_REPORT_ROWS {
        tracing::error!(table, limit = MAX_REPORT_ROWS, "Report window exceeds the row limit");
        return Err(AppError::Internal(format!(
            "Too many {table} records in the report window."
        )));
    }
    Ok(())
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<PgRow>, table: &str) -> AppResult<Vec<T>> {
    ensure_within_cap(rows.len(), table)?;
    let values = rows
        .iter()
        .map(|row| row.try_get::<Value, _>("row"))
        .collect::<Result<Vec<_>, _>>()?;
    decode_values(values, table)
}

/// Every value must decode; one bad row fails the section.
fn decode_values<T: DeserializeOwned>(values: Vec<Value>, table: &str) -> AppResult<Vec<T>> {
    values
        .into_iter()
        .map(|value| {
            serde_json::from_value::<T>(value).map_err(|error| {
                tracing::error!(table, error = %error, "Could not decode report row");
                AppError::Internal(format!("Could not decode {table} record."))
            })
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
}

fn party(id: Option<String>, name: Option<String>) -> Option<PartyRef> {
    let id = non_empty(id)?;
    let name = non_empty(name).unwrap_or_else(|| id.clone());
    Some(PartyRef { id, name })
}
