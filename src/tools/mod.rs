//! Backend wrappers and the registry they are assembled into.

pub mod upstream;
pub mod waste;
pub mod weather;

pub use upstream::UpstreamClient;
pub use waste::{OpenErzClient, WasteCalendar};
pub use weather::{TecdottirClient, WeatherStations};

use crate::error::{RegistryError, ToolError};
use crate::mcp::registry::ToolRegistry;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Converts validated arguments into a tool's typed argument struct.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolError::InvalidArgument(format!("invalid arguments: {}", e)))
}

/// Create and register all tools.
pub fn create_registry(
    calendar: Arc<dyn WasteCalendar>,
    weather: Arc<dyn WeatherStations>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::builder();

    // Waste collection (OpenERZ)
    registry.register(waste::NextCollectionTool::new(Arc::clone(&calendar)))?;
    registry.register(waste::NextCollectionForTypeTool::new(Arc::clone(&calendar)))?;
    registry.register(waste::ListRegionsTool::new(Arc::clone(&calendar)))?;
    registry.register(waste::ListAreasTool::new(Arc::clone(&calendar)))?;
    registry.register(waste::ListWasteTypesTool::new(calendar))?;

    // Weather stations (Tecdottir)
    registry.register(weather::ListStationsTool::new(Arc::clone(&weather)))?;
    registry.register(weather::MeasurementsTool::new(weather))?;

    Ok(registry.build())
}
