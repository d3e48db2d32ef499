//! Weather station tools backed by the Tecdottir API (Zurich lake stations).

use super::parse_args;
use super::upstream::UpstreamClient;
use crate::error::ToolError;
use crate::mcp::models::{ToolDescriptor, ToolOutput};
use crate::mcp::registry::ToolHandler;
use crate::mcp::schema::{InputSchema, ParamType, DATE_FORMAT};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::sync::Arc;

pub const LIST_STATIONS_TOOL: &str = "list_weather_stations";
pub const MEASUREMENTS_TOOL: &str = "get_weather_measurements";

pub const DEFAULT_MEASUREMENT_LIMIT: u32 = 10;
pub const MAX_MEASUREMENT_LIMIT: u32 = 100;

/// One row of station readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub station: String,
    pub timestamp: String,
    /// Reading name → `{value, unit, status}` as delivered upstream.
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementQuery {
    pub station: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: u32,
}

/// The weather operations the tools depend on.
#[async_trait]
pub trait WeatherStations: Send + Sync {
    /// Known station identifiers.
    fn stations(&self) -> Vec<String>;
    /// Latest readings first.
    async fn measurements(&self, query: &MeasurementQuery) -> Result<Vec<Measurement>, ToolError>;
}

// =============================================================================
// Tecdottir HTTP client
// =============================================================================

#[derive(Deserialize)]
struct MeasurementEnvelope {
    result: Vec<Measurement>,
}

pub struct TecdottirClient {
    upstream: UpstreamClient,
    base_url: String,
    stations: Vec<String>,
}

impl TecdottirClient {
    pub fn new(upstream: UpstreamClient, base_url: impl Into<String>, stations: Vec<String>) -> Self {
        Self {
            upstream,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            stations,
        }
    }
}

#[async_trait]
impl WeatherStations for TecdottirClient {
    fn stations(&self) -> Vec<String> {
        self.stations.clone()
    }

    async fn measurements(&self, query: &MeasurementQuery) -> Result<Vec<Measurement>, ToolError> {
        let url = format!("{}/measurements/{}", self.base_url, query.station);
        let mut params = vec![
            ("sort", "timestamp_cet desc".to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(start) = query.start_date {
            params.push(("startDate", start.format(DATE_FORMAT).to_string()));
        }
        if let Some(end) = query.end_date {
            params.push(("endDate", end.format(DATE_FORMAT).to_string()));
        }

        let envelope: MeasurementEnvelope = self.upstream.get_json(&url, &params).await?;
        Ok(envelope.result)
    }
}

// =============================================================================
// Formatting
// =============================================================================

fn format_reading(name: &str, reading: &Value) -> String {
    match reading {
        Value::Object(fields) => {
            let value = fields.get("value").map(render_scalar).unwrap_or_default();
            match fields.get("unit").and_then(Value::as_str).filter(|u| !u.is_empty()) {
                Some(unit) => format!("  {}: {} {}", name, value, unit),
                None => format!("  {}: {}", name, value),
            }
        }
        other => format!("  {}: {}", name, render_scalar(other)),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "n/a".to_string(),
        other => other.to_string(),
    }
}

pub fn format_measurement(measurement: &Measurement) -> String {
    let mut lines = vec![
        format!("Station: {}", measurement.station),
        format!("Timestamp: {}", measurement.timestamp),
    ];
    lines.extend(
        measurement
            .values
            .iter()
            .map(|(name, reading)| format_reading(name, reading)),
    );
    lines.join("\n")
}

// =============================================================================
// Tool handlers
// =============================================================================

#[derive(Deserialize)]
struct MeasurementArgs {
    station: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    /// Kept as a raw number so out-of-range values hit the range rule.
    limit: Number,
}

impl MeasurementArgs {
    /// Applies the domain rules the schema cannot express.
    fn into_query(self, known: &[String]) -> Result<MeasurementQuery, ToolError> {
        if !known.iter().any(|s| s == &self.station) {
            return Err(ToolError::NotFound(format!(
                "Unknown weather station '{}'. Use the '{}' tool to see valid values.",
                self.station, LIST_STATIONS_TOOL
            )));
        }

        let start_date = self.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = self.end_date.as_deref().map(parse_date).transpose()?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(ToolError::InvalidArgument(format!(
                    "end_date {} is before start_date {}",
                    end, start
                )));
            }
        }

        let limit = self
            .limit
            .as_u64()
            .and_then(|l| u32::try_from(l).ok())
            .filter(|l| (1..=MAX_MEASUREMENT_LIMIT).contains(l))
            .ok_or_else(|| {
                ToolError::InvalidArgument(format!(
                    "limit must be between 1 and {}",
                    MAX_MEASUREMENT_LIMIT
                ))
            })?;

        Ok(MeasurementQuery {
            station: self.station,
            start_date,
            end_date,
            limit,
        })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ToolError::InvalidArgument(format!("'{}' is not a valid date", raw)))
}

pub struct ListStationsTool {
    stations: Arc<dyn WeatherStations>,
}

impl ListStationsTool {
    pub fn new(stations: Arc<dyn WeatherStations>) -> Self {
        Self { stations }
    }
}

#[async_trait]
impl ToolHandler for ListStationsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            LIST_STATIONS_TOOL,
            "List the weather stations that measurements can be requested for.",
            InputSchema::empty(),
        )
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let stations = self.stations.stations();
        Ok(ToolOutput::new(
            stations.join("\n"),
            json!({ "stations": stations }),
        ))
    }
}

pub struct MeasurementsTool {
    stations: Arc<dyn WeatherStations>,
}

impl MeasurementsTool {
    pub fn new(stations: Arc<dyn WeatherStations>) -> Self {
        Self { stations }
    }
}

#[async_trait]
impl ToolHandler for MeasurementsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            MEASUREMENTS_TOOL,
            "Get recent measurements (air and water temperature, wind, pressure, ...) of a weather station.",
            InputSchema::empty()
                .required(
                    "station",
                    ParamType::String,
                    "Station identifier, see list_weather_stations",
                )
                .optional("start_date", ParamType::Date, "First day (YYYY-MM-DD)")
                .optional("end_date", ParamType::Date, "Last day (YYYY-MM-DD)")
                .optional_with_default(
                    "limit",
                    ParamType::Integer,
                    json!(DEFAULT_MEASUREMENT_LIMIT),
                    "Maximum number of rows, newest first",
                ),
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: MeasurementArgs = parse_args(arguments)?;
        let query = args.into_query(&self.stations.stations())?;

        let rows = self.stations.measurements(&query).await?;
        if rows.is_empty() {
            return Err(ToolError::NotFound(format!(
                "No measurements found for station '{}' in the requested range.",
                query.station
            )));
        }

        let text = rows
            .iter()
            .map(format_measurement)
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(ToolOutput::new(
            text,
            json!({
                "station": query.station,
                "latest": rows[0],
                "measurements": rows,
            }),
        ))
    }
}
