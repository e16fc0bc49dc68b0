//! Control operations: the requests a remote UI can make of the matrix.
//!
//! Each operation takes the [`MatrixContext`] plus a request record and
//! returns a serializable response, so any transport (HTTP, a serial console,
//! a test) can expose them. Parameters arrive loosely typed, the way form
//! fields and query strings do, and are validated here.
//!
//! ## Rust concepts
//! - `serde` derives for request/response records
//! - `serde_json::Value` for parameters that may be strings, numbers or bools
//! - `thiserror` for an error enum with display messages

use crate::driver::clamp_intensity;
use crate::render::MatrixContext;
use crate::visualization::{SnowSettings, SnowSettingsUpdate, registry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("{0}")]
    MissingParameter(&'static str),
    #[error("x or y out of range")]
    OutOfRange,
    #[error("{0} must be numeric")]
    InvalidNumber(&'static str),
    #[error("visualization not found: {0}")]
    UnknownVisualization(String),
    #[error("snow visualization is not active")]
    SnowInactive,
}

impl ControlError {
    /// HTTP status a transport should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingParameter(_) | Self::OutOfRange | Self::InvalidNumber(_) => 400,
            Self::UnknownVisualization(_) => 404,
            Self::SnowInactive => 409,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

// ── Parameter parsing ────────────────────────────────────────────────

/// `1`, `true` and `on` (any case) are true; everything else is false.
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        _ => false,
    }
}

/// An integer given either as a JSON number or as a decimal string.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Request/Response types ───────────────────────────────────────────

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HardwareInfo {
    pub columns: usize,
    pub rows: usize,
}

/// The framebuffer export: one bitmask per row, bit x = column x.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub columns: usize,
    pub rows: usize,
    pub framebuffer: Vec<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PixelRequest {
    pub x: Option<Value>,
    pub y: Option<Value>,
    pub on: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PixelResponse {
    pub x: usize,
    pub y: usize,
    pub on: bool,
    pub changed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FillRequest {
    /// Defaults to on when absent
    pub on: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FillResponse {
    pub filled: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VisualizationEntry {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VisualizationList {
    pub current: &'static str,
    pub visualizations: Vec<VisualizationEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectRequest {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CurrentVisualization {
    pub current: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct BrightnessRequest {
    pub value: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BrightnessResponse {
    pub brightness: u8,
}

/// Overall state, for a status endpoint or a log line.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DisplayStatus {
    pub current: &'static str,
    pub brightness: u8,
    pub refreshes: u64,
    pub version: &'static str,
}

// ── Operations ───────────────────────────────────────────────────────

pub fn hardware(ctx: &MatrixContext) -> HardwareInfo {
    let fb = ctx.framebuffer();
    HardwareInfo {
        columns: fb.width(),
        rows: fb.height(),
    }
}

pub fn display(ctx: &MatrixContext) -> DisplaySnapshot {
    let fb = ctx.framebuffer();
    DisplaySnapshot {
        columns: fb.width(),
        rows: fb.height(),
        framebuffer: fb.rows().to_vec(),
    }
}

/// Set one pixel, letting an active simulation absorb the edit.
pub fn set_pixel(ctx: &mut MatrixContext, req: PixelRequest) -> Result<PixelResponse, ControlError> {
    const REQUIRED: &str = "x, y, and on are required";
    let x = req.x.as_ref().and_then(parse_int);
    let y = req.y.as_ref().and_then(parse_int);
    let (Some(x), Some(y), Some(on)) = (x, y, req.on.as_ref()) else {
        return Err(ControlError::MissingParameter(REQUIRED));
    };
    let on = parse_flag(on);

    let fb = ctx.framebuffer();
    let in_range = |v: i64, limit: usize| usize::try_from(v).ok().filter(|&v| v < limit);
    let (Some(x), Some(y)) = (in_range(x, fb.width()), in_range(y, fb.height())) else {
        return Err(ControlError::OutOfRange);
    };

    let changed = ctx.set_pixel(x, y, on);
    Ok(PixelResponse { x, y, on, changed })
}

pub fn fill(ctx: &mut MatrixContext, req: FillRequest) -> FillResponse {
    let on = req.on.as_ref().is_none_or(parse_flag);
    ctx.fill(on);
    FillResponse { filled: on }
}

pub fn clear(ctx: &mut MatrixContext) -> ClearResponse {
    ctx.clear();
    ClearResponse { cleared: true }
}

pub fn visualizations(ctx: &MatrixContext) -> VisualizationList {
    VisualizationList {
        current: ctx.current_id(),
        visualizations: registry::available()
            .iter()
            .map(|d| VisualizationEntry {
                id: d.id,
                label: d.label,
            })
            .collect(),
    }
}

pub fn select_visualization(
    ctx: &mut MatrixContext,
    req: SelectRequest,
) -> Result<CurrentVisualization, ControlError> {
    let id = req.id.ok_or(ControlError::MissingParameter("id is required"))?;
    if !ctx.set_visualization(&id) {
        return Err(ControlError::UnknownVisualization(id));
    }
    Ok(CurrentVisualization {
        current: ctx.current_id(),
    })
}

pub fn brightness(ctx: &MatrixContext) -> BrightnessResponse {
    BrightnessResponse {
        brightness: ctx.driver().intensity(),
    }
}

pub fn set_brightness(
    ctx: &mut MatrixContext,
    req: BrightnessRequest,
) -> Result<BrightnessResponse, ControlError> {
    let value = req
        .value
        .ok_or(ControlError::MissingParameter("value is required"))?;
    let value = parse_int(&value).ok_or(ControlError::InvalidNumber("value"))?;
    let brightness = ctx.driver_mut().set_intensity(clamp_intensity(value));
    tracing::info!("Brightness set to {}", brightness);
    Ok(BrightnessResponse { brightness })
}

pub fn snow_settings(ctx: &MatrixContext) -> Result<SnowSettings, ControlError> {
    ctx.active()
        .and_then(|v| v.as_snow())
        .map(|snow| snow.settings())
        .ok_or(ControlError::SnowInactive)
}

pub fn update_snow_settings(
    ctx: &mut MatrixContext,
    update: SnowSettingsUpdate,
) -> Result<SnowSettings, ControlError> {
    let snow = ctx
        .active_mut()
        .and_then(|v| v.as_snow_mut())
        .ok_or(ControlError::SnowInactive)?;
    Ok(snow.apply(update))
}

pub fn status(ctx: &MatrixContext) -> DisplayStatus {
    DisplayStatus {
        current: ctx.current_id(),
        brightness: ctx.driver().intensity(),
        refreshes: ctx.refreshes(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
