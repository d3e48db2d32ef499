//! Waste collection tools backed by the OpenERZ API.

use super::parse_args;
use super::upstream::UpstreamClient;
use crate::error::ToolError;
use crate::mcp::models::{ToolDescriptor, ToolOutput};
use crate::mcp::registry::ToolHandler;
use crate::mcp::schema::{InputSchema, ParamType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const NEXT_COLLECTION_TOOL: &str = "get_next_waste_collection";
pub const NEXT_COLLECTION_FOR_TYPE_TOOL: &str = "get_next_waste_collection_for_type";
pub const LIST_REGIONS_TOOL: &str = "list_waste_regions";
pub const LIST_AREAS_TOOL: &str = "list_waste_areas";
pub const LIST_TYPES_TOOL: &str = "list_waste_types";

/// Number of calendar entries requested per lookup.
const CALENDAR_LIMIT: usize = 10;

/// One collection date from the OpenERZ calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub date: String,
    #[serde(default)]
    pub waste_type: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarQuery {
    pub region: String,
    pub waste_type: Option<String>,
    pub area: Option<String>,
}

/// The OpenERZ operations the tools depend on.
#[async_trait]
pub trait WasteCalendar: Send + Sync {
    async fn regions(&self) -> Result<Vec<String>, ToolError>;
    async fn areas(&self, region: &str) -> Result<Vec<String>, ToolError>;
    async fn waste_types(&self) -> Result<Vec<String>, ToolError>;
    /// Upcoming collections, soonest first.
    async fn upcoming(&self, query: &CalendarQuery) -> Result<Vec<CalendarEntry>, ToolError>;
}

// =============================================================================
// OpenERZ HTTP client
// =============================================================================

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: Vec<T>,
}

#[derive(Deserialize)]
struct AreaEntry {
    #[serde(default)]
    area: Option<String>,
}

pub struct OpenErzClient {
    upstream: UpstreamClient,
    base_url: String,
}

impl OpenErzClient {
    pub fn new(upstream: UpstreamClient, base_url: impl Into<String>) -> Self {
        Self {
            upstream,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl WasteCalendar for OpenErzClient {
    async fn regions(&self) -> Result<Vec<String>, ToolError> {
        let envelope: ResultEnvelope<String> = self
            .upstream
            .get_json(&self.url("/parameter/regions"), &[])
            .await?;
        Ok(envelope.result)
    }

    async fn areas(&self, region: &str) -> Result<Vec<String>, ToolError> {
        let envelope: ResultEnvelope<AreaEntry> = self
            .upstream
            .get_json(
                &self.url("/parameter/areas"),
                &[("region", region.to_string())],
            )
            .await?;
        let areas: BTreeSet<String> = envelope
            .result
            .into_iter()
            .filter_map(|entry| entry.area)
            .filter(|area| !area.is_empty())
            .collect();
        Ok(areas.into_iter().collect())
    }

    async fn waste_types(&self) -> Result<Vec<String>, ToolError> {
        let envelope: ResultEnvelope<String> = self
            .upstream
            .get_json(&self.url("/parameter/types"), &[])
            .await?;
        Ok(envelope.result)
    }

    async fn upcoming(&self, query: &CalendarQuery) -> Result<Vec<CalendarEntry>, ToolError> {
        let today = chrono::Local::now().date_naive();
        let mut params = vec![
            ("limit", CALENDAR_LIMIT.to_string()),
            ("region", query.region.clone()),
            ("sort", "date".to_string()),
            ("start", today.format("%Y-%m-%d").to_string()),
        ];
        if let Some(waste_type) = &query.waste_type {
            params.push(("types", waste_type.clone()));
        }
        if let Some(area) = &query.area {
            params.push(("area", area.clone()));
        }

        let envelope: ResultEnvelope<CalendarEntry> = self
            .upstream
            .get_json(&self.url("/calendar"), &params)
            .await?;
        Ok(envelope.result)
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Renders one calendar entry as a readable block.
pub fn format_calendar_entry(entry: &CalendarEntry) -> String {
    format!(
        "Date: {}\nWaste Type: {}\nRegion: {}\nArea: {}\nDescription: {}",
        entry.date,
        entry.waste_type.as_deref().unwrap_or("Unknown"),
        entry.region.as_deref().unwrap_or("Unknown"),
        entry.area.as_deref().unwrap_or("Unknown"),
        entry
            .description
            .as_deref()
            .unwrap_or("No description available"),
    )
}

pub fn format_calendar(entries: &[CalendarEntry]) -> String {
    entries
        .iter()
        .map(format_calendar_entry)
        .collect::<Vec<_>>()
        .join("\n---\n")
}

// =============================================================================
// Lookup logic
// =============================================================================

/// Validates the region, fetches the calendar and picks the next collection.
pub async fn next_collection(
    calendar: &dyn WasteCalendar,
    query: CalendarQuery,
) -> Result<ToolOutput, ToolError> {
    let regions = calendar.regions().await?;
    if !regions.iter().any(|r| r == &query.region) {
        return Err(ToolError::NotFound(format!(
            "Region '{}' is not valid. Use the '{}' tool to see valid values.",
            query.region, LIST_REGIONS_TOOL
        )));
    }

    let mut entries = calendar.upcoming(&query).await?;
    entries.truncate(CALENDAR_LIMIT);

    let Some(next) = entries.first().cloned() else {
        return Err(ToolError::NotFound(format!(
            "No upcoming waste collection entries found for region '{}'.",
            query.region
        )));
    };

    let areas: BTreeSet<&str> = entries
        .iter()
        .filter_map(|e| e.area.as_deref())
        .filter(|area| !area.is_empty())
        .collect();
    if areas.len() > 1 && query.area.is_none() {
        return Err(ToolError::InvalidArgument(format!(
            "Multiple areas found for region '{}'. Please specify an area using the 'area' parameter. Use the '{}' tool to see valid values.",
            query.region, LIST_AREAS_TOOL
        )));
    }

    Ok(ToolOutput::new(
        format_calendar(&entries),
        json!({
            "region": query.region,
            "area": next.area,
            "date": next.date,
            "waste_type": next.waste_type,
            "description": next.description,
            "upcoming": entries,
        }),
    ))
}

// =============================================================================
// Tool handlers
// =============================================================================

#[derive(Deserialize)]
struct NextCollectionArgs {
    region: String,
    #[serde(default)]
    area: Option<String>,
}

#[derive(Deserialize)]
struct NextCollectionForTypeArgs {
    region: String,
    waste_type: String,
    #[serde(default)]
    area: Option<String>,
}

#[derive(Deserialize)]
struct RegionArgs {
    region: String,
}

pub struct NextCollectionTool {
    calendar: Arc<dyn WasteCalendar>,
}

impl NextCollectionTool {
    pub fn new(calendar: Arc<dyn WasteCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl ToolHandler for NextCollectionTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            NEXT_COLLECTION_TOOL,
            "Get the next waste collections for a region, optionally narrowed to an area.",
            InputSchema::empty()
                .required(
                    "region",
                    ParamType::String,
                    "Region identifier, see list_waste_regions",
                )
                .optional(
                    "area",
                    ParamType::String,
                    "Area within the region, see list_waste_areas",
                ),
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: NextCollectionArgs = parse_args(arguments)?;
        next_collection(
            self.calendar.as_ref(),
            CalendarQuery {
                region: args.region,
                waste_type: None,
                area: args.area,
            },
        )
        .await
    }
}

pub struct NextCollectionForTypeTool {
    calendar: Arc<dyn WasteCalendar>,
}

impl NextCollectionForTypeTool {
    pub fn new(calendar: Arc<dyn WasteCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl ToolHandler for NextCollectionForTypeTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            NEXT_COLLECTION_FOR_TYPE_TOOL,
            "Get the next collections of one waste type (e.g. paper, cardboard) for a region.",
            InputSchema::empty()
                .required(
                    "region",
                    ParamType::String,
                    "Region identifier, see list_waste_regions",
                )
                .required(
                    "waste_type",
                    ParamType::String,
                    "Waste type, see list_waste_types",
                )
                .optional(
                    "area",
                    ParamType::String,
                    "Area within the region, see list_waste_areas",
                ),
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: NextCollectionForTypeArgs = parse_args(arguments)?;
        next_collection(
            self.calendar.as_ref(),
            CalendarQuery {
                region: args.region,
                waste_type: Some(args.waste_type),
                area: args.area,
            },
        )
        .await
    }
}

pub struct ListRegionsTool {
    calendar: Arc<dyn WasteCalendar>,
}

impl ListRegionsTool {
    pub fn new(calendar: Arc<dyn WasteCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl ToolHandler for ListRegionsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            LIST_REGIONS_TOOL,
            "List valid region identifiers for the waste collection tools.",
            InputSchema::empty(),
        )
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let regions = self.calendar.regions().await?;
        Ok(ToolOutput::new(
            regions.join("\n"),
            json!({ "regions": regions }),
        ))
    }
}

pub struct ListAreasTool {
    calendar: Arc<dyn WasteCalendar>,
}

impl ListAreasTool {
    pub fn new(calendar: Arc<dyn WasteCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl ToolHandler for ListAreasTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            LIST_AREAS_TOOL,
            "List valid area identifiers for a region.",
            InputSchema::empty().required(
                "region",
                ParamType::String,
                "Region identifier, see list_waste_regions",
            ),
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: RegionArgs = parse_args(arguments)?;
        let mut areas = self.calendar.areas(&args.region).await?;
        if areas.is_empty() {
            return Err(ToolError::NotFound(format!(
                "No areas found for region '{}'.",
                args.region
            )));
        }
        areas.sort();
        areas.dedup();
        Ok(ToolOutput::new(
            areas.join("\n"),
            json!({ "region": args.region, "areas": areas }),
        ))
    }
}

pub struct ListWasteTypesTool {
    calendar: Arc<dyn WasteCalendar>,
}

impl ListWasteTypesTool {
    pub fn new(calendar: Arc<dyn WasteCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl ToolHandler for ListWasteTypesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            LIST_TYPES_TOOL,
            "List the waste types known to the collection calendar.",
            InputSchema::empty(),
        )
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let types = self.calendar.waste_types().await?;
        Ok(ToolOutput::new(types.join("\n"), json!({ "waste_types": types })))
    }
}
