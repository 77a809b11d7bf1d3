use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{months_spanning, percentage, round2};
use crate::models::{DateRange, Invoice, InvoiceStatus, Payment, PaymentMethod};

const TOP_CLIENTS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceStatusCounts {
    pub paid: u64,
    pub pending: u64,
    pub overdue: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodShare {
    pub method: &'static str,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRevenue {
    pub client_id: String,
    pub name: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub month: String,
    pub label: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceShare {
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub total_revenue: f64,
    pub paid_amount: f64,
    pub unpaid_amount: f64,
    pub payment_rate: f64,
    pub invoice_count: u64,
    pub invoice_status: InvoiceStatusCounts,
    /// Invoices whose stored status disagrees with their payments.
    pub status_mismatches: u64,
    pub payment_method_distribution: Vec<MethodShare>,
    pub top_clients: Vec<ClientRevenue>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub service_revenue: BTreeMap<String, ServiceShare>,
}

/// `payments` is every payment collected in the window, independent of the
/// invoice filters.
pub fn summarize_finance(
    invoices: &[Invoice],
    payments: &[Payment],
    range: &DateRange,
    now: DateTime<Utc>,
) -> FinancialReport {
    let total_revenue = invoices.iter().map(|invoice| invoice.amount).sum::<f64>();

    let mut paid_amount = 0.0;
    let mut invoice_status = InvoiceStatusCounts::default();
    let mut status_mismatches = 0;
    for invoice in invoices {
        let reconciled = reconciled_status(invoice, now);
        match reconciled {
            InvoiceStatus::Paid => {
                paid_amount += invoice.amount;
                invoice_status.paid += 1;
            }
            InvoiceStatus::Pending => invoice_status.pending += 1,
            InvoiceStatus::Overdue => invoice_status.overdue += 1,
        }
        if invoice
            .stored_status
            .is_some_and(|stored| stored != reconciled)
        {
            tracing::debug!(invoice_id = %invoice.id, "Invoice status disagrees with its payments");
            status_mismatches += 1;
        }
    }

    FinancialReport {
        total_revenue: round2(total_revenue),
        paid_amount: round2(paid_amount),
        unpaid_amount: round2(total_revenue - paid_amount),
        payment_rate: percentage(paid_amount, total_revenue),
        invoice_count: invoices.len() as u64,
        invoice_status,
        status_mismatches,
        payment_method_distribution: payment_method_distribution(payments),
        top_clients: top_clients(invoices),
        monthly_revenue: monthly_revenue(invoices, range),
        service_revenue: service_revenue(invoices),
    }
}

fn reconciled_status(invoice: &Invoice, now: DateTime<Utc>) -> InvoiceStatus {
    if invoice.is_settled() {
        InvoiceStatus::Paid
    } else if invoice.due_date.is_some_and(|due| due < now) {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Pending
    }
}

fn payment_method_distribution(payments: &[Payment]) -> Vec<MethodShare> {
    let mut by_method: BTreeMap<PaymentMethod, f64> = BTreeMap::new();
    for payment in payments {
        *by_method.entry(payment.method).or_insert(0.0) += payment.amount;
    }
    let collected = by_method.values().sum::<f64>();
    if collected <= 0.0 {
        return Vec::new();
    }

    let mut shares = by_method
        .into_iter()
        .map(|(method, amount)| MethodShare {
            method: method.as_str(),
            amount: round2(amount),
            percentage: percentage(amount, collected),
        })
        .collect::<Vec<_>>();
    shares.sort_by(|left, right| right.amount.total_cmp(&left.amount));
    shares
}

fn top_clients(invoices: &[Invoice]) -> Vec<ClientRevenue> {
    let mut by_client: HashMap<&str, ClientRevenue> = HashMap::new();
    for invoice in invoices {
        let Some(client) = invoice.client.as_ref() else {
            continue;
        };
        by_client
            .entry(client.id.as_str())
            .or_insert_with(|| ClientRevenue {
                client_id: client.id.clone(),
                name: client.name.clone(),
                revenue: 0.0,
            })
            .revenue += invoice.amount;
    }

    let mut ranking = by_client
        .into_values()
        .map(|mut client| {
            client.revenue = round2(client.revenue);
            client
        })
        .collect::<Vec<_>>();
    ranking.sort_by(|left, right| {
        right
            .revenue
            .total_cmp(&left.revenue)
            .then_with(|| left.name.cmp(&right.name))
    });
    ranking.truncate(TOP_CLIENTS);
    ranking
}

fn monthly_revenue(invoices: &[Invoice], range: &DateRange) -> Vec<MonthlyRevenue> {
    months_spanning(range)
        .into_iter()
        .map(|month| {
            let revenue = invoices
                .iter()
                .filter(|invoice| month.contains(invoice.created_at))
                .map(|invoice| invoice.amount)
                .sum::<f64>();
            MonthlyRevenue {
                month: month.key,
                label: month.label,
                revenue: round2(revenue),
            }
        })
        .collect()
}

/// Keyed by the order's service type; invoices whose order has none are left out.
fn service_revenue(invoices: &[Invoice]) -> BTreeMap<String, ServiceShare> {
    let mut by_service: BTreeMap<String, f64> = BTreeMap::new();
    for invoice in invoices {
        if let Some(service) = invoice.service_type.as_deref() {
            *by_service.entry(service.to_string()).or_insert(0.0) += invoice.amount;
        }
    }
    let total = by_service.values().sum::<f64>();

    by_service
        .into_iter()
        .map(|(service, amount)| {
            let share = ServiceShare {
                amount: round2(amount),
                percentage: percentage(amount, total),
            };
            (service, share)
        })
        .collect()
}
