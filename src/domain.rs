use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const L1C_BASE_URL: &str = "https://storage.googleapis.com/gcp-public-data-sentinel-2/tiles";
pub const L2A_BASE_URL: &str = "https://storage.googleapis.com/gcp-public-data-sentinel-2/L2/tiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingLevel {
    L1C,
    L2A,
}

impl ProcessingLevel {
    pub fn manifest_name(&self) -> &'static str {
        match self {
            ProcessingLevel::L1C => "MTD_MSIL1C.xml",
            ProcessingLevel::L2A => "MTD_MSIL2A.xml",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProcessingLevel::L1C => L1C_BASE_URL,
            ProcessingLevel::L2A => L2A_BASE_URL,
        }
    }
}

impl fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingLevel::L1C => write!(f, "L1C"),
            ProcessingLevel::L2A => write!(f, "L2A"),
        }
    }
}

/// Positional coordinates of a tile in the bucket's directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoordinates {
    pub grid_square: String,
    pub latitude_band: String,
    pub path_number: String,
}

/// Decodes the tile coordinates from the second-to-last `_` segment of a
/// product id: chars `[1,3)` grid square, `[3]` latitude band, `[4,6)` path
/// number.
pub fn parse_tile_coordinates(product_id: &str) -> Result<TileCoordinates, FetchError> {
    let segments = product_id.split('_').collect::<Vec<_>>();
    if segments.len() < 2 {
        return Err(FetchError::InvalidIdentifierFormat(product_id.to_string()));
    }
    let details = segments[segments.len() - 2].chars().collect::<Vec<_>>();
    if details.len() < 6 {
        return Err(FetchError::InvalidIdentifierFormat(product_id.to_string()));
    }

    Ok(TileCoordinates {
        grid_square: details[1..3].iter().collect(),
        latitude_band: details[3].to_string(),
        path_number: details[4..6].iter().collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tile_coordinates(&self) -> Result<TileCoordinates, FetchError> {
        parse_tile_coordinates(&self.0)
    }

    /// Level suffix of the mission segment, e.g. `MSIL1C` -> `L1C`. Any
    /// suffix other than `L1C` is served from the L2A layout.
    pub fn processing_level(&self) -> Result<ProcessingLevel, FetchError> {
        let mission = self
            .0
            .split('_')
            .nth(1)
            .ok_or_else(|| FetchError::InvalidIdentifierFormat(self.0.clone()))?;
        if mission.ends_with("L1C") {
            Ok(ProcessingLevel::L1C)
        } else {
            Ok(ProcessingLevel::L2A)
        }
    }

    /// Local directory name the tile is stored under.
    pub fn scene_dir_name(&self) -> String {
        format!("{}.SAFE", self.0)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !normalized.starts_with("S2") {
            return Err(FetchError::InvalidProductId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const L1C_ID: &str = "S2A_MSIL1C_20200101T000000_N0209_R000_T56HKH_20200101T000000";

    #[test]
    fn parse_coordinates_from_tile_segment() {
        let coords = parse_tile_coordinates(L1C_ID).unwrap();
        assert_eq!(coords.grid_square, "56");
        assert_eq!(coords.latitude_band, "H");
        assert_eq!(coords.path_number, "KH");
    }

    #[test]
    fn parse_coordinates_is_deterministic() {
        let first = parse_tile_coordinates(L1C_ID).unwrap();
        let second = parse_tile_coordinates(L1C_ID).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_coordinates_rejects_single_segment() {
        let err = parse_tile_coordinates("T56HKH").unwrap_err();
        assert_matches!(err, FetchError::InvalidIdentifierFormat(_));
    }

    #[test]
    fn parse_coordinates_rejects_short_segment() {
        let err = parse_tile_coordinates("S2A_MSIL1C_T56H_20200101").unwrap_err();
        assert_matches!(err, FetchError::InvalidIdentifierFormat(_));
    }

    #[test]
    fn parse_coordinates_counts_characters_not_bytes() {
        let err = parse_tile_coordinates("S2A_ééé_X").unwrap_err();
        assert_matches!(err, FetchError::InvalidIdentifierFormat(_));
    }

    #[test]
    fn product_id_requires_s2_prefix() {
        let err = "LC08_L1TP_001002".parse::<ProductId>().unwrap_err();
        assert_matches!(err, FetchError::InvalidProductId(_));
    }

    #[test]
    fn product_id_is_trimmed() {
        let id: ProductId = format!("  {L1C_ID}\n").parse().unwrap();
        assert_eq!(id.as_str(), L1C_ID);
        assert_eq!(id.scene_dir_name(), format!("{L1C_ID}.SAFE"));
    }

    #[test]
    fn processing_level_routing() {
        let l1c: ProductId = L1C_ID.parse().unwrap();
        assert_eq!(l1c.processing_level().unwrap(), ProcessingLevel::L1C);
        assert_eq!(
            l1c.processing_level().unwrap().manifest_name(),
            "MTD_MSIL1C.xml"
        );

        let l2a: ProductId = "S2B_MSIL2A_20210101T000000_N0214_R000_T50HMK_20210101T000000"
            .parse()
            .unwrap();
        assert_eq!(l2a.processing_level().unwrap(), ProcessingLevel::L2A);
        assert_eq!(
            l2a.processing_level().unwrap().default_base_url(),
            L2A_BASE_URL
        );

        let other: ProductId = "S2A_MSIL9Z_X_T56HKH_Y".parse().unwrap();
        assert_eq!(other.processing_level().unwrap(), ProcessingLevel::L2A);

        let bare: ProductId = "S2A".parse().unwrap();
        assert_matches!(
            bare.processing_level(),
            Err(FetchError::InvalidIdentifierFormat(_))
        );
    }
}
