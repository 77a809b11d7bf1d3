use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::{percentage, round2};
use crate::models::{Incident, Shipment, TransportMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeShare {
    pub mode: &'static str,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionLoad {
    pub region: String,
    pub shipments: u64,
    pub total_distance: f64,
    pub average_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseActivity {
    pub warehouse_id: String,
    pub name: String,
    pub shipments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsReport {
    pub total_shipments: u64,
    pub transport_modes: Vec<ModeShare>,
    pub incident_count: u64,
    pub incident_types: BTreeMap<&'static str, u64>,
    pub regional_distribution: Vec<RegionLoad>,
    /// Mean distance in km over shipments that record one.
    pub average_distance: f64,
    pub warehouse_activity: Vec<WarehouseActivity>,
}

/// Shipments are expected to be filtered already; incidents are counted over
/// the whole window.
pub fn summarize_logistics(shipments: &[Shipment], incidents: &[Incident]) -> LogisticsReport {
    let total_shipments = shipments.len() as u64;

    let mut incident_types: BTreeMap<&'static str, u64> = BTreeMap::new();
    for incident in incidents {
        *incident_types.entry(incident.incident_type.as_str()).or_insert(0) += 1;
    }

    let distances = shipments
        .iter()
        .filter_map(|shipment| shipment.distance_km)
        .collect::<Vec<_>>();

    LogisticsReport {
        total_shipments,
        transport_modes: transport_modes(shipments),
        incident_count: incidents.len() as u64,
        incident_types,
        regional_distribution: regional_distribution(shipments),
        average_distance: mean(&distances),
        warehouse_activity: warehouse_activity(shipments),
    }
}

/// Transport mode a service type implies for the shipment query. Service types
/// with no transport mode leave shipments unfiltered.
pub fn transport_mode_filter(service: Option<&str>) -> Option<TransportMode> {
    let service = service?;
    let mode = TransportMode::for_service(service);
    if mode.is_none() {
        tracing::debug!(service, "Service type has no transport mode; shipments not filtered");
    }
    mode
}

fn transport_modes(shipments: &[Shipment]) -> Vec<ModeShare> {
    let mut by_mode: BTreeMap<TransportMode, u64> = BTreeMap::new();
    for shipment in shipments {
        *by_mode.entry(shipment.transport_mode).or_insert(0) += 1;
    }
    let total = shipments.len() as f64;

    let mut shares = by_mode
        .into_iter()
        .map(|(mode, count)| ModeShare {
            mode: mode.as_str(),
            count,
            percentage: percentage(count as f64, total),
        })
        .collect::<Vec<_>>();
    shares.sort_by(|left, right| right.count.cmp(&left.count));
    shares
}

/// Shipments with no region are left out.
fn regional_distribution(shipments: &[Shipment]) -> Vec<RegionLoad> {
    let mut by_region: BTreeMap<&str, (u64, Vec<f64>)> = BTreeMap::new();
    for shipment in shipments {
        let Some(region) = shipment.region.as_deref() else {
            continue;
        };
        let entry = by_region.entry(region).or_default();
        entry.0 += 1;
        if let Some(distance) = shipment.distance_km {
            entry.1.push(distance);
        }
    }

    let mut regions = by_region
        .into_iter()
        .map(|(region, (count, distances))| RegionLoad {
            region: region.to_string(),
            shipments: count,
            total_distance: round2(distances.iter().sum()),
            average_distance: mean(&distances),
        })
        .collect::<Vec<_>>();
    regions.sort_by(|left, right| right.shipments.cmp(&left.shipments));
    regions
}

fn warehouse_activity(shipments: &[Shipment]) -> Vec<WarehouseActivity> {
    let mut by_warehouse: HashMap<&str, WarehouseActivity> = HashMap::new();
    for warehouse in shipments.iter().filter_map(|shipment| shipment.warehouse.as_ref()) {
        by_warehouse
            .entry(warehouse.id.as_str())
            .or_insert_with(|| WarehouseActivity {
                warehouse_id: warehouse.id.clone(),
                name: warehouse.name.clone(),
                shipments: 0,
            })
            .shipments += 1;
    }

    let mut activity = by_warehouse.into_values().collect::<Vec<_>>();
    activity.sort_by(|left, right| {
        right
            .shipments
            .cmp(&left.shipments)
            .then_with(|| left.name.cmp(&right.name))
    });
    activity
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round2(values.iter().sum::<f64>() / values.len() as f64)
}
