// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Geohash encoding for coarse proximity lookups.
//!
//! Profiles store the geohash of their location so that radius queries can
//! be expressed as a handful of string prefix ranges against Firestore.

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported geohash (roughly 3.7cm x 1.9cm cells).
pub const MAX_PRECISION: usize = 12;

/// Precision used for the `geohash` field stored on every profile.
pub const GEOHASH_PRECISION: usize = 9;

/// Approximate length of one degree of latitude, in meters.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Errors from geohash operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoHashError {
    #[error("Coordinates out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("Unsupported precision {0} (max {MAX_PRECISION})")]
    Precision(usize),

    #[error("Invalid geohash character {0:?}")]
    InvalidChar(char),
}

/// Latitude/longitude bounds of a geohash cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    const WORLD: BoundingBox = BoundingBox {
        min_lat: -90.0,
        max_lat: 90.0,
        min_lon: -180.0,
        max_lon: 180.0,
    };

    /// Center of the cell as (lat, lon).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Encode a coordinate into a geohash of `precision` characters.
///
/// Precision 0 yields the empty string (the whole world).
pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String, GeoHashError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(GeoHashError::OutOfRange { lat, lon });
    }
    if precision > MAX_PRECISION {
        return Err(GeoHashError::Precision(precision));
    }

    let mut bounds = BoundingBox::WORLD;
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0;
    let mut index = 0usize;

    while hash.len() < precision {
        if even {
            let mid = (bounds.min_lon + bounds.max_lon) / 2.0;
            if lon >= mid {
                index = (index << 1) | 1;
                bounds.min_lon = mid;
            } else {
                index <<= 1;
                bounds.max_lon = mid;
            }
        } else {
            let mid = (bounds.min_lat + bounds.max_lat) / 2.0;
            if lat >= mid {
                index = (index << 1) | 1;
                bounds.min_lat = mid;
            } else {
                index <<= 1;
                bounds.max_lat = mid;
            }
        }
        even = !even;
        bits += 1;

        if bits == 5 {
            hash.push(BASE32[index] as char);
            bits = 0;
            index = 0;
        }
    }

    Ok(hash)
}

/// Decode a geohash into the bounds of its cell.
pub fn decode_bbox(hash: &str) -> Result<BoundingBox, GeoHashError> {
    let mut bounds = BoundingBox::WORLD;
    let mut even = true;

    for c in hash.chars() {
        let lower = c.to_ascii_lowercase();
        let value = BASE32
            .iter()
            .position(|&b| b as char == lower)
            .ok_or(GeoHashError::InvalidChar(c))?;

        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1;
            if even {
                let mid = (bounds.min_lon + bounds.max_lon) / 2.0;
                if bit == 1 {
                    bounds.min_lon = mid;
                } else {
                    bounds.max_lon = mid;
                }
            } else {
                let mid = (bounds.min_lat + bounds.max_lat) / 2.0;
                if bit == 1 {
                    bounds.min_lat = mid;
                } else {
                    bounds.max_lat = mid;
                }
            }
            even = !even;
        }
    }

    Ok(bounds)
}

/// Decode a geohash into the (lat, lon) center of its cell.
pub fn decode(hash: &str) -> Result<(f64, f64), GeoHashError> {
    decode_bbox(hash).map(|b| b.center())
}

/// The cells surrounding `hash`, at the same precision.
///
/// Longitude wraps around the antimeridian; rows beyond the poles are
/// dropped, so polar cells have fewer than 8 neighbors.
pub fn neighbors(hash: &str) -> Result<Vec<String>, GeoHashError> {
    if hash.is_empty() {
        return Ok(Vec::new());
    }

    let bbox = decode_bbox(hash)?;
    let (lat, lon) = bbox.center();
    let height = bbox.max_lat - bbox.min_lat;
    let width = bbox.max_lon - bbox.min_lon;

    let mut cells = Vec::with_capacity(8);
    for dy in [-1.0, 0.0, 1.0] {
        for dx in [-1.0, 0.0, 1.0] {
            if dy == 0.0 && dx == 0.0 {
                continue;
            }
            let n_lat = lat + dy * height;
            if !(-90.0..=90.0).contains(&n_lat) {
                continue;
            }
            let mut n_lon = lon + dx * width;
            if n_lon > 180.0 {
                n_lon -= 360.0;
            } else if n_lon < -180.0 {
                n_lon += 360.0;
            }

            let cell = encode(n_lat, n_lon, hash.len())?;
            if cell != hash && !cells.contains(&cell) {
                cells.push(cell);
            }
        }
    }

    Ok(cells)
}

/// Longest precision whose cells are at least `radius_m` tall and wide
/// around latitude `lat`.
///
/// A circle of that radius centered anywhere in a cell is then covered by
/// the cell and its neighbors. Returns 0 when even single-character cells
/// are too small.
pub fn precision_for_radius(radius_m: f64, lat: f64) -> usize {
    let lat_scale = lat.to_radians().cos().abs();

    (1..=MAX_PRECISION)
        .rev()
        .find(|&precision| {
            let total_bits = 5 * precision as i32;
            let lon_bits = (total_bits + 1) / 2;
            let lat_bits = total_bits / 2;
            let height_m = 180.0 / 2f64.powi(lat_bits) * METERS_PER_DEGREE;
            let width_m = 360.0 / 2f64.powi(lon_bits) * METERS_PER_DEGREE * lat_scale;
            height_m.min(width_m) >= radius_m
        })
        .unwrap_or(0)
}
