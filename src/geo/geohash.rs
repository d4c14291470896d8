//! Geohash proximity keys and radius query bounds.
//!
//! `encode` produces the standard base32 geohash, so spatial locality shows
//! up as shared key prefixes. `query_bounds` computes a set of contiguous
//! key ranges covering a disc of the given radius. The cover is a strict
//! superset of the disc (false positives allowed, never false negatives), so
//! callers must post-filter candidates by exact distance.

use std::f64::consts::PI;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// 10 characters resolves to roughly 1.2m x 60cm cells.
pub const DEFAULT_PRECISION: usize = 10;

const BITS_PER_CHAR: u32 = 5;
const MAX_BITS_PRECISION: u32 = 22 * BITS_PER_CHAR;

const EARTH_MERIDIONAL_CIRCUMFERENCE_M: f64 = 40_007_860.0;
const METERS_PER_DEGREE_LATITUDE: f64 = 110_574.0;
const EARTH_EQ_RADIUS_M: f64 = 6_378_137.0;

/// Square of the WGS84 ellipsoid eccentricity.
const E2: f64 = 0.006_694_478_197_99;
const EPSILON: f64 = 1e-12;

/// An inclusive `[start, end]` range of proximity keys. `end` may carry a
/// `~` sentinel, which sorts after every base32 digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeohashRange {
    pub start: String,
    pub end: String,
}

impl GeohashRange {
    pub fn contains(&self, hash: &str) -> bool {
        hash >= self.start.as_str() && hash <= self.end.as_str()
    }
}

pub fn encode(lat: f64, lng: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0usize;
    let mut bit_count = 0u32;
    let mut even_bit = true;

    while hash.len() < precision {
        let (value, range) = if even_bit {
            (lng, &mut lng_range)
        } else {
            (lat, &mut lat_range)
        };

        let mid = (range.0 + range.1) / 2.0;
        bits <<= 1;
        if value >= mid {
            bits |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }

        even_bit = !even_bit;
        bit_count += 1;
        if bit_count == BITS_PER_CHAR {
            hash.push(BASE32[bits] as char);
            bits = 0;
            bit_count = 0;
        }
    }

    hash
}

/// Key ranges covering the disc of `radius_m` meters around `center`,
/// deduplicated, in generation order.
pub fn query_bounds(center_lat: f64, center_lng: f64, radius_m: f64) -> Vec<GeohashRange> {
    let query_bits = bounding_box_bits(center_lat, radius_m).max(1);
    let precision = query_bits.div_ceil(BITS_PER_CHAR) as usize;

    let mut ranges: Vec<GeohashRange> = Vec::with_capacity(9);
    for (lat, lng) in bounding_box_coordinates(center_lat, center_lng, radius_m) {
        let range = range_for_hash(&encode(lat, lng, precision), query_bits);
        if !ranges.contains(&range) {
            ranges.push(range);
        }
    }
    ranges
}

/// Longitude degrees spanned by `distance_m` meters at a given latitude,
/// accounting for the ellipsoid. Degenerates to a full wrap near the poles.
fn meters_to_longitude_degrees(distance_m: f64, latitude: f64) -> f64 {
    let radians = latitude.to_radians();
    let numerator = radians.cos() * EARTH_EQ_RADIUS_M * PI / 180.0;
    let denominator = 1.0 / (1.0 - E2 * radians.sin() * radians.sin()).sqrt();
    let degrees_per_unit = numerator * denominator;

    if degrees_per_unit < EPSILON {
        if distance_m > 0.0 { 360.0 } else { 0.0 }
    } else {
        (distance_m / degrees_per_unit).min(360.0)
    }
}

fn longitude_bits_for_resolution(resolution_m: f64, latitude: f64) -> f64 {
    let degrees = meters_to_longitude_degrees(resolution_m, latitude);
    if degrees.abs() > 1e-6 {
        (360.0 / degrees).log2().max(1.0)
    } else {
        1.0
    }
}

fn latitude_bits_for_resolution(resolution_m: f64) -> f64 {
    (EARTH_MERIDIONAL_CIRCUMFERENCE_M / 2.0 / resolution_m)
        .log2()
        .min(MAX_BITS_PRECISION as f64)
}

fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let adjusted = longitude + 180.0;
    if adjusted > 0.0 {
        (adjusted % 360.0) - 180.0
    } else {
        180.0 - (-adjusted % 360.0)
    }
}

/// Number of geohash bits at which a cell is no larger than a bounding box
/// of `size_m` meters centered at the given latitude.
fn bounding_box_bits(latitude: f64, size_m: f64) -> u32 {
    let lat_delta_degrees = size_m / METERS_PER_DEGREE_LATITUDE;
    let latitude_north = (latitude + lat_delta_degrees).min(90.0);
    let latitude_south = (latitude - lat_delta_degrees).max(-90.0);

    let bits_lat = latitude_bits_for_resolution(size_m).floor() * 2.0;
    let bits_lng_north = longitude_bits_for_resolution(size_m, latitude_north).floor() * 2.0 - 1.0;
    let bits_lng_south = longitude_bits_for_resolution(size_m, latitude_south).floor() * 2.0 - 1.0;

    bits_lat
        .min(bits_lng_north)
        .min(bits_lng_south)
        .min(MAX_BITS_PRECISION as f64)
        .max(0.0) as u32
}

/// Center, edge midpoints, and corners of the bounding box. Latitude clamps
/// at the poles; longitude wraps across the antimeridian.
fn bounding_box_coordinates(
    center_lat: f64,
    center_lng: f64,
    radius_m: f64,
) -> [(f64, f64); 9] {
    let lat_degrees = radius_m / METERS_PER_DEGREE_LATITUDE;
    let latitude_north = (center_lat + lat_degrees).min(90.0);
    let latitude_south = (center_lat - lat_degrees).max(-90.0);
    let lng_degrees = meters_to_longitude_degrees(radius_m, latitude_north)
        .max(meters_to_longitude_degrees(radius_m, latitude_south));

    let west = wrap_longitude(center_lng - lng_degrees);
    let east = wrap_longitude(center_lng + lng_degrees);

    [
        (center_lat, center_lng),
        (center_lat, west),
        (center_lat, east),
        (latitude_north, center_lng),
        (latitude_north, west),
        (latitude_north, east),
        (latitude_south, center_lng),
        (latitude_south, west),
        (latitude_south, east),
    ]
}

/// The key range whose members share the first `bits` bits with `hash`.
fn range_for_hash(hash: &str, bits: u32) -> GeohashRange {
    let precision = bits.div_ceil(BITS_PER_CHAR) as usize;
    if hash.len() < precision {
        return GeohashRange {
            start: hash.to_string(),
            end: format!("{hash}~"),
        };
    }

    let hash = &hash[..precision];
    let base = &hash[..hash.len() - 1];
    let last_char = hash.as_bytes()[hash.len() - 1];
    let last_value = BASE32
        .iter()
        .position(|&c| c == last_char)
        .unwrap_or(0) as u32;

    let significant_bits = bits - (base.len() as u32) * BITS_PER_CHAR;
    let unused_bits = BITS_PER_CHAR - significant_bits;
    let start_value = (last_value >> unused_bits) << unused_bits;
    let end_value = start_value + (1 << unused_bits);

    if end_value > 31 {
        GeohashRange {
            start: format!("{base}{}", BASE32[start_value as usize] as char),
            end: format!("{base}~"),
        }
    } else {
        GeohashRange {
            start: format!("{base}{}", BASE32[start_value as usize] as char),
            end: format!("{base}{}", BASE32[end_value as usize] as char),
        }
    }
}
