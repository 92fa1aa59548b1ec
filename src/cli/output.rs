//! Output formatting for CLI commands

use crate::model::DeviceState;
use crate::notification::format_duration;
use serde::Serialize;

/// Format output as pretty JSON
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// One human-readable row per printer
pub fn format_state_row(device_id: &str, state: &DeviceState) -> String {
    format!(
        "{:<12} {:<9} {:>5.1}%  left {:<9} nozzle {:>5.1}  bed {:>5.1}  {}",
        device_id,
        state.print_state.as_str(),
        state.progress * 100.0,
        format_duration(state.still_printing),
        state.temperature.nozzle,
        state.temperature.bed,
        state.job_name,
    )
}
