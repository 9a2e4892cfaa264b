use serde::{Deserialize, Serialize};

/// Geographic bounds in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// `[west, south, east, north]`, the order Sentinel Hub expects.
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

/// A monitored region. Identity is the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bbox: BoundingBox,
}

impl Region {
    pub fn new(name: &str, latitude: f64, longitude: f64, bbox: [f64; 4]) -> Self {
        let [west, south, east, north] = bbox;
        Self {
            name: name.to_string(),
            latitude,
            longitude,
            bbox: BoundingBox {
                west,
                south,
                east,
                north,
            },
        }
    }

    /// Name with spaces replaced, for tile ids and file names.
    pub fn slug(&self) -> String {
        self.name.replace(' ', "_")
    }
}

/// The fixed set of monitored regions, in processing order.
pub fn default_regions() -> Vec<Region> {
    vec![
        Region::new("Amazon Basin", -3.4653, -62.2159, [-73.0, -15.0, -50.0, 5.0]),
        Region::new("Congo Basin", 0.0, 22.0, [15.0, -5.0, 30.0, 5.0]),
        Region::new("Ganges Delta", 22.5, 90.0, [88.0, 21.0, 92.0, 24.0]),
        Region::new("Lake Chad", 13.0, 14.5, [13.0, 12.0, 16.0, 14.0]),
        Region::new("Borneo Rainforest", 1.0, 114.0, [108.0, -4.0, 119.0, 7.0]),
        Region::new("Great Barrier Reef", -18.0, 147.0, [143.0, -24.0, 153.0, -10.0]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_names_unique() {
        let regions = default_regions();
        let mut names: Vec<_> = regions.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), regions.len());
    }

    #[test]
    fn test_bbox_order() {
        let amazon = &default_regions()[0];
        assert_eq!(amazon.bbox.to_array(), [-73.0, -15.0, -50.0, 5.0]);
        assert_eq!(amazon.slug(), "Amazon_Basin");
    }
}
