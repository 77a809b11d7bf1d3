use std::collections::HashMap;

use serde::Serialize;

use super::{months_spanning, percentage, round2};
use crate::models::{DateRange, Order, OrderStatus};

const TOP_AGENTS: usize = 6;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKpis {
    pub total_orders: u64,
    pub on_time_deliveries: u64,
    pub on_time_rate: f64,
    /// Delivered orders completed no later than their promised date.
    pub promised_date_met: u64,
    /// Mean days from creation to completion.
    pub avg_delivery_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistribution {
    pub pending: u64,
    pub in_progress: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl StatusDistribution {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.delivered + self.cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_id: String,
    pub name: String,
    pub total: u64,
    pub completed: u64,
    pub efficiency: f64,
}

/// Share of delivered orders, in percent, by days taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTimeDistribution {
    pub one_day: f64,
    pub two_days: f64,
    pub three_days: f64,
    pub more_than_three_days: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    pub month: String,
    pub label: String,
    pub orders: u64,
    pub delivered: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReport {
    pub kpis: OrderKpis,
    pub status_distribution: StatusDistribution,
    pub agent_performance: Vec<AgentPerformance>,
    pub delivery_time_distribution: DeliveryTimeDistribution,
    pub monthly_trends: Vec<MonthlyTrend>,
}

pub fn summarize_orders(orders: &[Order], range: &DateRange) -> OrderReport {
    let total_orders = orders.len() as u64;
    let delivered = orders
        .iter()
        .filter(|order| order.is_delivered())
        .collect::<Vec<_>>();

    let on_time_deliveries = delivered
        .iter()
        .filter(|order| delivered_on_time(order))
        .count() as u64;
    let promised_date_met = delivered
        .iter()
        .filter(|order| met_promised_date(order))
        .count() as u64;

    let timed = delivered
        .iter()
        .filter(|order| order.pickup_date.is_some())
        .map(|order| elapsed_days(order))
        .collect::<Vec<_>>();
    let avg_delivery_time = if timed.is_empty() {
        0.0
    } else {
        round2(timed.iter().sum::<f64>() / timed.len() as f64)
    };

    let status_distribution = status_distribution(orders);
    let unclassified = total_orders.saturating_sub(status_distribution.total());
    if unclassified > 0 {
        tracing::debug!(unclassified, "Orders left out of the status distribution");
    }

    OrderReport {
        kpis: OrderKpis {
            total_orders,
            on_time_deliveries,
            on_time_rate: percentage(on_time_deliveries as f64, total_orders as f64),
            promised_date_met,
            avg_delivery_time,
        },
        status_distribution,
        agent_performance: agent_performance(orders),
        delivery_time_distribution: delivery_time_distribution(&delivered),
        monthly_trends: monthly_trends(orders, range),
    }
}

/// Delivered with a pickup recorded no later than the last update.
fn delivered_on_time(order: &Order) -> bool {
    order.is_delivered()
        && order
            .pickup_date
            .is_some_and(|pickup| pickup <= order.updated_at)
}

fn met_promised_date(order: &Order) -> bool {
    order.is_delivered()
        && order
            .expected_delivery_date
            .is_some_and(|expected| order.completed_at().date_naive() <= expected.date_naive())
}

fn elapsed_days(order: &Order) -> f64 {
    let millis = (order.completed_at() - order.created_at).num_milliseconds();
    (millis as f64 / MILLIS_PER_DAY).max(0.0)
}

fn status_distribution(orders: &[Order]) -> StatusDistribution {
    let mut distribution = StatusDistribution::default();
    for order in orders {
        match order.status {
            Some(OrderStatus::Pending) => distribution.pending += 1,
            Some(OrderStatus::InProgress) => distribution.in_progress += 1,
            Some(OrderStatus::Delivered) => distribution.delivered += 1,
            Some(OrderStatus::Cancelled) => distribution.cancelled += 1,
            None => {}
        }
    }
    distribution
}

fn agent_performance(orders: &[Order]) -> Vec<AgentPerformance> {
    let mut by_agent: HashMap<&str, AgentPerformance> = HashMap::new();
    for order in orders {
        let Some(agent) = order.agent.as_ref() else {
            continue;
        };
        let entry = by_agent
            .entry(agent.id.as_str())
            .or_insert_with(|| AgentPerformance {
                agent_id: agent.id.clone(),
                name: agent.name.clone(),
                total: 0,
                completed: 0,
                efficiency: 0.0,
            });
        entry.total += 1;
        if order.is_delivered() {
            entry.completed += 1;
        }
    }

    let mut ranking = by_agent
        .into_values()
        .map(|mut agent| {
            agent.efficiency = percentage(agent.completed as f64, agent.total as f64);
            agent
        })
        .collect::<Vec<_>>();
    ranking.sort_by(|left, right| {
        right
            .efficiency
            .total_cmp(&left.efficiency)
            .then_with(|| right.completed.cmp(&left.completed))
            .then_with(|| left.name.cmp(&right.name))
    });
    ranking.truncate(TOP_AGENTS);
    ranking
}

fn delivery_time_distribution(delivered: &[&Order]) -> DeliveryTimeDistribution {
    let mut buckets = [0_u64; 4];
    for order in delivered {
        let days = elapsed_days(order);
        let index = if days <= 1.0 {
            0
        } else if days <= 2.0 {
            1
        } else if days <= 3.0 {
            2
        } else {
            3
        };
        buckets[index] += 1;
    }

    let whole = delivered.len() as f64;
    DeliveryTimeDistribution {
        one_day: percentage(buckets[0] as f64, whole),
        two_days: percentage(buckets[1] as f64, whole),
        three_days: percentage(buckets[2] as f64, whole),
        more_than_three_days: percentage(buckets[3] as f64, whole),
    }
}

fn monthly_trends(orders: &[Order], range: &DateRange) -> Vec<MonthlyTrend> {
    months_spanning(range)
        .into_iter()
        .map(|month| {
            let in_month = orders
                .iter()
                .filter(|order| month.contains(order.created_at))
                .collect::<Vec<_>>();
            MonthlyTrend {
                orders: in_month.len() as u64,
                delivered: in_month.iter().filter(|order| order.is_delivered()).count() as u64,
                month: month.key,
                label: month.label,
            }
        })
        .collect()
}
