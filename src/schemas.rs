use serde::Deserialize;

/// Query string of `GET /admin/reports`. Every field is optional; values are
/// interpreted by the report service, not rejected here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReportQuery {
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub period: Option<String>,
    pub region: Option<String>,
    pub service: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}
