//! The fixed catalog of provisioned locations.
//!
//! Location `n` (1-based) is `toilet_<n>`; buildings advance every three
//! locations and floors cycle Ground/First/Second.

use crate::constants::FORM_PATH_PREFIX;

const FLOORS: [&str; 3] = ["Ground Floor", "First Floor", "Second Floor"];

/// One provisioned location as known before it reaches the data service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLocation {
    pub id: String,
    pub name: String,
    pub building: String,
    pub floor: String,
}

impl CatalogLocation {
    /// Build the entry for zero-based catalog position `index`
    pub fn at(index: u32) -> Self {
        let number = index + 1;
        Self {
            id: format!("{}_{}", FORM_PATH_PREFIX, number),
            name: format!("Toilet {}", number),
            building: building_letter(index).to_string(),
            floor: floor_name(index).to_string(),
        }
    }

    /// Free-text description, e.g. `Building A - Ground Floor`
    pub fn description(&self) -> String {
        format!("Building {} - {}", self.building, self.floor)
    }

    /// Upper-case card heading, e.g. `TOILET 7`
    pub fn label(&self) -> String {
        self.id.replacen('_', " ", 1).to_uppercase()
    }

    /// File name of the generated QR image
    pub fn image_file_name(&self) -> String {
        format!("{}_qr.png", self.id)
    }
}

pub fn building_letter(index: u32) -> char {
    // past 'Z' wraps around rather than leaving the alphabet
    char::from(b'A' + (index / 3 % 26) as u8)
}

pub fn floor_name(index: u32) -> &'static str {
    FLOORS[(index % 3) as usize]
}

/// All locations `1..=count` in order
pub fn catalog(count: u32) -> Vec<CatalogLocation> {
    (0..count).map(CatalogLocation::at).collect()
}
