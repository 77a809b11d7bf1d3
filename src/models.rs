//! Read-only records the reports are computed from, and the canonical
//! vocabularies their raw status strings are translated into.

use chrono::{DateTime, Utc};

/// Inclusive `[from, to]` window every report query is bounded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    InProgress,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Translates the status codes found in `orders.status`, including the
    /// French and upper-case variants written by older clients.
    pub fn from_code(raw: &str) -> Option<Self> {
        match fold_code(raw).as_str() {
            "pending" | "en_attente" | "nouvelle" | "new" | "created" => Some(Self::Pending),
            "shipped" | "expediee" | "en_cours" | "in_progress" | "in_transit" | "en_transit"
            | "validee" | "confirmed" => Some(Self::InProgress),
            "delivered" | "livree" | "completed" | "terminee" => Some(Self::Delivered),
            "cancelled" | "canceled" | "annulee" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Overdue,
}

impl InvoiceStatus {
    pub fn from_code(raw: &str) -> Option<Self> {
        match fold_code(raw).as_str() {
            "paid" | "payee" | "reglee" => Some(Self::Paid),
            "pending" | "en_attente" | "unpaid" | "impayee" => Some(Self::Pending),
            "overdue" | "en_retard" | "late" => Some(Self::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Cash,
    MobileMoney,
    Check,
    Other,
}

impl PaymentMethod {
    pub fn from_code(raw: &str) -> Self {
        match fold_code(raw).as_str() {
            "bank_transfer" | "virement" | "virement_bancaire" | "transfer" => Self::BankTransfer,
            "card" | "carte" | "carte_bancaire" | "credit_card" | "cb" => Self::Card,
            "cash" | "especes" => Self::Cash,
            "mobile_money" | "mobile" | "momo" => Self::MobileMoney,
            "check" | "cheque" => Self::Check,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::Cash => "cash",
            Self::MobileMoney => "mobile_money",
            Self::Check => "check",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportMode {
    Road,
    Sea,
    Air,
    Rail,
    Other,
}

impl TransportMode {
    pub fn from_code(raw: &str) -> Self {
        Self::known(&fold_code(raw)).unwrap_or(Self::Other)
    }

    /// Transport mode a service type ships with, used to apply the service
    /// filter to shipments.
    pub fn for_service(service: &str) -> Option<Self> {
        match fold_code(service).as_str() {
            "express" => Some(Self::Air),
            folded => Self::known(folded),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Road => "road",
            Self::Sea => "sea",
            Self::Air => "air",
            Self::Rail => "rail",
            Self::Other => "other",
        }
    }

    /// Folded codes stored for this mode. `Other` has none.
    pub fn codes(self) -> &'static [&'static str] {
        match self {
            Self::Road => &["road", "routier", "terrestre", "truck", "camion"],
            Self::Sea => &["sea", "maritime", "ship", "bateau"],
            Self::Air => &["air", "aerien", "plane", "avion"],
            Self::Rail => &["rail", "ferroviaire", "train"],
            Self::Other => &[],
        }
    }

    fn known(folded: &str) -> Option<Self> {
        [Self::Road, Self::Sea, Self::Air, Self::Rail]
            .into_iter()
            .find(|mode| mode.codes().contains(&folded))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IncidentType {
    Delay,
    Damage,
    Loss,
    Customs,
    Other,
}

impl IncidentType {
    pub fn from_code(raw: &str) -> Self {
        match fold_code(raw).as_str() {
            "delay" | "retard" => Self::Delay,
            "damage" | "dommage" | "endommage" | "colis_endommage" => Self::Damage,
            "loss" | "lost" | "perte" | "perdu" => Self::Loss,
            "customs" | "douane" => Self::Customs,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Damage => "damage",
            Self::Loss => "loss",
            Self::Customs => "customs",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartyRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` when the stored code is not in the translation table.
    pub status: Option<OrderStatus>,
    pub agent: Option<PartyRef>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_delivered(&self) -> bool {
        self.status == Some(OrderStatus::Delivered)
    }

    /// Moment the order was completed; older rows only carry `updated_at`.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.delivered_at.unwrap_or(self.updated_at)
    }
}

#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: String,
    pub amount: f64,
    pub stored_status: Option<InvoiceStatus>,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub service_type: Option<String>,
    pub client: Option<PartyRef>,
    pub payment_amounts: Vec<f64>,
}

impl Invoice {
    pub fn paid_total(&self) -> f64 {
        self.payment_amounts.iter().sum()
    }

    /// Paid means the recorded payments cover the amount, whatever `status` says.
    pub fn is_settled(&self) -> bool {
        self.paid_total() >= self.amount
    }
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub amount: f64,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct Shipment {
    pub region: Option<String>,
    pub transport_mode: TransportMode,
    pub distance_km: Option<f64>,
    pub warehouse: Option<PartyRef>,
}

#[derive(Debug, Clone)]
pub struct Incident {
    pub incident_type: IncidentType,
}

/// Lower-cases, strips French accents and joins words with `_`.
fn fold_code(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|character| match character {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'à' | 'â' | 'ä' => 'a',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            ' ' | '-' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{IncidentType, InvoiceStatus, OrderStatus, PaymentMethod, TransportMode};

    #[test]
    fn order_status_vocabularies_converge() {
        assert_eq!(OrderStatus::from_code("Expédiée"), Some(OrderStatus::InProgress));
        assert_eq!(OrderStatus::from_code("SHIPPED"), Some(OrderStatus::InProgress));
        assert_eq!(OrderStatus::from_code("Validée"), Some(OrderStatus::InProgress));
        assert_eq!(OrderStatus::from_code("DELIVERED"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::from_code("Livrée"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::from_code("LIVREE"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::from_code("En attente"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::from_code("Annulée"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::from_code("archived"), None);
    }

    #[test]
    fn invoice_status_accepts_french_codes() {
        assert_eq!(InvoiceStatus::from_code("Payée"), Some(InvoiceStatus::Paid));
        assert_eq!(InvoiceStatus::from_code("EN_RETARD"), Some(InvoiceStatus::Overdue));
        assert_eq!(InvoiceStatus::from_code(""), None);
    }

    #[test]
    fn unknown_methods_and_modes_fall_back_to_other() {
        assert_eq!(PaymentMethod::from_code("Virement bancaire"), PaymentMethod::BankTransfer);
        assert_eq!(PaymentMethod::from_code("crypto"), PaymentMethod::Other);
        assert_eq!(TransportMode::from_code("Aérien"), TransportMode::Air);
        assert_eq!(TransportMode::from_code("drone"), TransportMode::Other);
        assert_eq!(IncidentType::from_code("Douane"), IncidentType::Customs);
    }

    #[test]
    fn service_types_map_to_transport_modes() {
        assert_eq!(TransportMode::for_service("Maritime"), Some(TransportMode::Sea));
        assert_eq!(TransportMode::for_service("express"), Some(TransportMode::Air));
        assert_eq!(TransportMode::for_service("Terrestre"), Some(TransportMode::Road));
        assert_eq!(TransportMode::for_service("entreposage"), None);
    }

    #[test]
    fn every_mode_code_translates_back_to_its_mode() {
        for mode in [TransportMode::Road, TransportMode::Sea, TransportMode::Air, TransportMode::Rail] {
            assert!(!mode.codes().is_empty());
            for code in mode.codes() {
                assert_eq!(TransportMode::from_code(code), mode, "{code}");
            }
        }
        assert!(TransportMode::Other.codes().is_empty());
    }
}
