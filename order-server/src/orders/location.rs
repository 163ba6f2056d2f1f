//! Delivery location resolution
//!
//! Order of preference: usable declared coordinates, then the declared text,
//! then the user's stored profile address, then [`ADDRESS_PENDING`].

use shared::models::UserProfile;

/// Stored when nothing better is known
pub const ADDRESS_PENDING: &str = "Address pending";

/// Texts clients send while geolocation is still running (compared lowercase)
const PLACEHOLDERS: [&str; 5] = [
    "current location",
    "ubicación actual",
    "my location",
    "detecting location...",
    "n/a",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Empty text counts as a placeholder
pub fn is_placeholder(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    normalized.is_empty() || PLACEHOLDERS.contains(&normalized.as_str())
}

/// Both present, finite, in range and not the (0, 0) "null island" default
pub fn usable_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Option<(f64, f64)> {
    let (lat, lng) = (latitude?, longitude?);
    let in_range = lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng);
    if in_range && !(lat == 0.0 && lng == 0.0) {
        Some((lat, lng))
    } else {
        None
    }
}

pub fn resolve(
    declared: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    profile: Option<&UserProfile>,
) -> ResolvedLocation {
    let declared_text = declared
        .map(str::trim)
        .filter(|t| !is_placeholder(t))
        .map(str::to_string);
    let profile_address = profile
        .and_then(|p| p.stored_address.as_deref())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    if let Some((lat, lng)) = usable_coordinates(latitude, longitude) {
        return ResolvedLocation {
            text: declared_text
                .or(profile_address)
                .unwrap_or_else(|| ADDRESS_PENDING.to_string()),
            latitude: Some(lat),
            longitude: Some(lng),
        };
    }

    if let Some(text) = declared_text {
        return ResolvedLocation {
            text,
            latitude: None,
            longitude: None,
        };
    }

    let profile_coords = profile.and_then(|p| usable_coordinates(p.latitude, p.longitude));
    ResolvedLocation {
        text: profile_address.unwrap_or_else(|| ADDRESS_PENDING.to_string()),
        latitude: profile_coords.map(|c| c.0),
        longitude: profile_coords.map(|c| c.1),
    }
}
