use std::fmt;

use crate::domain::{ProductId, TileCoordinates};

/// Remote `.SAFE/` directory of one tile, always ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation(String);

impl StoreLocation {
    pub fn build(base_url: &str, product_id: &ProductId, coords: &TileCoordinates) -> Self {
        Self(format!(
            "{base_url}/{}/{}/{}/{}.SAFE/",
            coords.grid_square,
            coords.latitude_band,
            coords.path_number,
            product_id.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_url(&self, name: &str) -> String {
        format!("{}{name}", self.0)
    }

    pub fn band_url(&self, entry: &str) -> String {
        format!("{}{entry}.jp2", self.0)
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
