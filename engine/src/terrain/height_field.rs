//! Height Field
//!
//! Row-major grid of elevation samples with clamped bilinear sampling.
//! Heightmap payloads arrive either flat (row-major) or nested (`z[x][z]`);
//! both are normalized here, once, into the flat representation.

use serde::Deserialize;
use serde_json::Value;

use crate::error::HeightmapError;

/// 2D elevation grid, `samples[z * width + x]`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl HeightField {
    /// Build from row-major samples. Fails unless `samples.len() == width * height`
    /// and every sample is finite.
    pub fn new(width: usize, height: usize, samples: Vec<f32>) -> Result<Self, HeightmapError> {
        if width == 0 || height == 0 {
            return Err(HeightmapError::Malformed(format!(
                "invalid dimensions {width}x{height}"
            )));
        }
        if samples.is_empty() {
            return Err(HeightmapError::Empty);
        }
        let cells = cell_count(width, height)?;
        if samples.len() != cells {
            return Err(HeightmapError::Malformed(format!(
                "expected {cells} samples for {width}x{height}, got {}",
                samples.len()
            )));
        }
        if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
            return Err(HeightmapError::Malformed(format!(
                "sample {index} is not a finite number"
            )));
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Constant-height field.
    pub fn flat(width: usize, height: usize, value: f32) -> Result<Self, HeightmapError> {
        let cells = cell_count(width, height)?;
        Self::new(width, height, vec![value; cells])
    }

    /// Field computed from `f(x, z)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> f32,
    ) -> Result<Self, HeightmapError> {
        let samples = (0..height)
            .flat_map(|z| (0..width).map(move |x| (x, z)))
            .map(|(x, z)| f(x, z))
            .collect();
        Self::new(width, height, samples)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Grid value with both indices clamped into range.
    pub fn at(&self, ix: usize, iz: usize) -> f32 {
        let x = ix.min(self.width - 1);
        let z = iz.min(self.height - 1);
        self.samples[z * self.width + x]
    }

    /// Clamp a continuous coordinate to `[0, width-1] × [0, height-1]`.
    pub fn clamp_xz(&self, x: f32, z: f32) -> (f32, f32) {
        let x = if x.is_finite() { x } else { 0.0 };
        let z = if z.is_finite() { z } else { 0.0 };
        (
            x.clamp(0.0, (self.width - 1) as f32),
            z.clamp(0.0, (self.height - 1) as f32),
        )
    }

    /// Bilinear height at a continuous coordinate (clamped first).
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let (x, z) = self.clamp_xz(x, z);
        let x0 = x.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let z1 = (z0 + 1).min(self.height - 1);
        let tx = x - x0 as f32;
        let tz = z - z0 as f32;

        let h00 = self.at(x0, z0);
        let h10 = self.at(x1, z0);
        let h01 = self.at(x0, z1);
        let h11 = self.at(x1, z1);

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }

    /// `(min, max)` of all samples.
    pub fn range(&self) -> (f32, f32) {
        self.samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    // ========================================================================
    // PAYLOAD NORMALIZATION
    // ========================================================================

    /// Normalize a heightmap payload.
    ///
    /// Flat `z` needs explicit `width` and `height`. Nested `z` is read as
    /// `z[x][z]`: missing `width` falls back to the outer length and missing
    /// `height` to the first row's length.
    pub fn from_payload(payload: &HeightmapPayload) -> Result<Self, HeightmapError> {
        let Some(z) = &payload.z else {
            return Err(HeightmapError::Missing);
        };
        match z {
            HeightData::Flat(values) => {
                if values.is_empty() {
                    return Err(HeightmapError::Empty);
                }
                let (Some(width), Some(height)) = (payload.width, payload.height) else {
                    return Err(HeightmapError::Malformed(
                        "flat z data needs width and height".to_string(),
                    ));
                };
                Self::new(width, height, values.iter().map(|&v| v as f32).collect())
            }
            HeightData::Nested(columns) => {
                if columns.is_empty() {
                    return Err(HeightmapError::Empty);
                }
                let width = payload.width.unwrap_or(columns.len());
                let height = payload.height.unwrap_or(columns[0].len());

                let mut errors = Vec::new();
                if columns.len() != width {
                    errors.push(format!("expected {width} rows, got {}", columns.len()));
                }
                for (i, column) in columns.iter().enumerate() {
                    if column.len() != height {
                        errors.push(format!(
                            "row {i} has unexpected length {} (expected {height})",
                            column.len()
                        ));
                    }
                }
                if !errors.is_empty() {
                    return Err(HeightmapError::Malformed(errors.join("; ")));
                }

                let mut samples = vec![0.0; cell_count(width, height)?];
                for (x, column) in columns.iter().enumerate() {
                    for (z, &v) in column.iter().enumerate() {
                        samples[z * width + x] = v as f32;
                    }
                }
                Self::new(width, height, samples)
            }
        }
    }

    /// Parse a JSON payload, accepting a `{ "heightmap": {...} }` wrapper.
    pub fn from_json(value: &Value) -> Result<Self, HeightmapError> {
        let inner = match value.get("heightmap") {
            Some(Value::Null) => return Err(HeightmapError::Missing),
            Some(inner) => inner,
            None if value.is_null() => return Err(HeightmapError::Missing),
            None => value,
        };
        let payload = HeightmapPayload::deserialize(inner)
            .map_err(|e| HeightmapError::Malformed(e.to_string()))?;
        Self::from_payload(&payload)
    }

    pub fn from_json_str(text: &str) -> Result<Self, HeightmapError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| HeightmapError::Malformed(e.to_string()))?;
        Self::from_json(&value)
    }
}

/// `width * height`, or `Malformed` when the product overflows.
fn cell_count(width: usize, height: usize) -> Result<usize, HeightmapError> {
    width.checked_mul(height).ok_or_else(|| {
        HeightmapError::Malformed(format!("dimensions {width}x{height} are too large"))
    })
}

/// Raw heightmap payload as fetched.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct HeightmapPayload {
    #[serde(default)]
    pub width: Option<usize>,
    #[serde(default)]
    pub height: Option<usize>,
    #[serde(default)]
    pub z: Option<HeightData>,
}

/// Flat row-major samples or nested `z[x][z]` columns.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HeightData {
    Flat(Vec<f64>),
    Nested(Vec<Vec<f64>>),
}

// ============================================================================
// TESTS
// ============================================================================
