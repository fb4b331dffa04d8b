//! Regional grid - fixed-size cells, each owning one biome classification

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::biome::BiomeType;

/// Index of a region in the grid arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl RegionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Cell coordinates in grid space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Coord) -> f32 {
        let dx = (i64::from(self.x) - i64::from(other.x)) as f32;
        let dy = (i64::from(self.y) - i64::from(other.y)) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Latitude band of a region. Drives the local climate offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClimateZone {
    Polar,
    Temperate,
    Subtropical,
    Tropical,
}

impl ClimateZone {
    pub const COUNT: usize = 4;

    /// Zone for a row, mirrored around the equator at mid-height.
    pub fn for_latitude(y: i32, height: i32) -> Self {
        if height <= 1 {
            return ClimateZone::Temperate;
        }
        let t = y as f32 / (height - 1) as f32;
        let from_equator = (t - 0.5).abs() * 2.0;
        match from_equator {
            d if d > 0.8 => ClimateZone::Polar,
            d if d > 0.45 => ClimateZone::Temperate,
            d if d > 0.2 => ClimateZone::Subtropical,
            _ => ClimateZone::Tropical,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Temperature offset in degrees relative to the global mean.
    pub fn temperature_offset(self) -> f32 {
        match self {
            ClimateZone::Polar => -20.0,
            ClimateZone::Temperate => 0.0,
            ClimateZone::Subtropical => 8.0,
            ClimateZone::Tropical => 12.0,
        }
    }

    pub fn humidity_offset(self) -> f32 {
        match self {
            ClimateZone::Polar => -0.15,
            ClimateZone::Temperate => 0.05,
            ClimateZone::Subtropical => -0.35,
            ClimateZone::Tropical => 0.3,
        }
    }

    pub fn precipitation_offset(self) -> f32 {
        match self {
            ClimateZone::Polar => -0.25,
            ClimateZone::Temperate => 0.1,
            ClimateZone::Subtropical => -0.35,
            ClimateZone::Tropical => 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub coordinates: Coord,
    pub biome: BiomeType,
    pub climate_zone: ClimateZone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalGrid {
    width: u32,
    height: u32,
    regions: Vec<Region>,
}

impl RegionalGrid {
    /// Uniform grid, every cell starting as `biome`.
    pub fn new(width: u32, height: u32, biome: BiomeType) -> Self {
        let mut regions = Vec::with_capacity((width * height) as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                regions.push(Region {
                    coordinates: Coord::new(x, y),
                    biome,
                    climate_zone: ClimateZone::for_latitude(y, height as i32),
                });
            }
        }
        Self {
            width,
            height,
            regions,
        }
    }

    /// Procedural layout: latitude bands pick the zone, the zone picks a
    /// plausible biome, edge columns are coastal and a few cells are mountains.
    pub fn generate<R: Rng + ?Sized>(width: u32, height: u32, rng: &mut R) -> Self {
        let mut grid = Self::new(width, height, BiomeType::Grassland);
        for region in &mut grid.regions {
            let edge = region.coordinates.x == 0 || region.coordinates.x == width as i32 - 1;
            region.biome = if edge && region.climate_zone != ClimateZone::Polar {
                BiomeType::Coastal
            } else if rng.gen::<f32>() < 0.05 {
                BiomeType::Mountain
            } else {
                let options = zone_biomes(region.climate_zone);
                options[rng.gen_range(0..options.len())]
            };
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        (0..self.regions.len() as u32).map(RegionId)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.index())
    }

    pub fn contains(&self, id: RegionId) -> bool {
        id.index() < self.regions.len()
    }

    pub fn id_at(&self, coord: Coord) -> Option<RegionId> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        let (x, y) = (coord.x as u32, coord.y as u32);
        if x < self.width && y < self.height {
            Some(RegionId(y * self.width + x))
        } else {
            None
        }
    }

    pub fn region_at(&self, coord: Coord) -> Option<&Region> {
        self.id_at(coord).and_then(|id| self.region(id))
    }

    pub fn biome(&self, id: RegionId) -> Option<BiomeType> {
        self.region(id).map(|r| r.biome)
    }

    /// Only the biome engine commits biome changes.
    pub(crate) fn set_biome(&mut self, id: RegionId, biome: BiomeType) -> Option<BiomeType> {
        let region = self.regions.get_mut(id.index())?;
        let previous = region.biome;
        region.biome = biome;
        Some(previous)
    }

    /// Neighbouring regions (4-connectivity)
    pub fn neighbors(&self, id: RegionId) -> Vec<RegionId> {
        let Some(region) = self.region(id) else {
            return Vec::new();
        };
        let c = region.coordinates;
        [(0, -1), (0, 1), (-1, 0), (1, 0)]
            .iter()
            .filter_map(|(dx, dy)| self.id_at(Coord::new(c.x + dx, c.y + dy)))
            .collect()
    }

    /// Euclidean distance between two region centres.
    pub fn distance(&self, a: RegionId, b: RegionId) -> Option<f32> {
        Some(self.region(a)?.coordinates.distance(self.region(b)?.coordinates))
    }

    /// Every region whose centre lies within `radius` of `center`, with its
    /// distance.
    pub fn within_radius(&self, center: Coord, radius: f32) -> Vec<(RegionId, f32)> {
        if radius.is_nan() || radius < 0.0 || self.is_empty() {
            return Vec::new();
        }
        // Scan only the part of the bounding box that lies on the grid.
        let reach = f64::from(radius).ceil().min(f64::from(u32::MAX)) as i64;
        let clip = |centre: i32, size: u32| {
            let low = (i64::from(centre) - reach).max(0);
            let high = (i64::from(centre) + reach).min(i64::from(size) - 1);
            (low, high)
        };
        let (x_low, x_high) = clip(center.x, self.width);
        let (y_low, y_high) = clip(center.y, self.height);
        let mut out = Vec::new();
        for y in y_low..=y_high {
            for x in x_low..=x_high {
                let (x, y) = (x as i32, y as i32);
                let coord = Coord::new(x, y);
                if let Some(id) = self.id_at(coord) {
                    let d = center.distance(coord);
                    if d <= radius {
                        out.push((id, d));
                    }
                }
            }
        }
        out
    }

    pub fn biome_distribution(&self) -> [usize; BiomeType::COUNT] {
        let mut counts = [0usize; BiomeType::COUNT];
        for region in &self.regions {
            counts[region.biome.index()] += 1;
        }
        counts
    }

    /// Share of neighbour pairs that keep the same biome; 1.0 means no
    /// fragmentation at all.
    pub fn contiguity(&self) -> f32 {
        let mut same = 0u32;
        let mut total = 0u32;
        for region in &self.regions {
            let c = region.coordinates;
            for (dx, dy) in [(1, 0), (0, 1)] {
                if let Some(other) = self.region_at(Coord::new(c.x + dx, c.y + dy)) {
                    total += 1;
                    if other.biome == region.biome {
                        same += 1;
                    }
                }
            }
        }
        if total == 0 {
            1.0
        } else {
            same as f32 / total as f32
        }
    }
}

fn zone_biomes(zone: ClimateZone) -> &'static [BiomeType] {
    match zone {
        ClimateZone::Polar => &[BiomeType::Tundra, BiomeType::Taiga],
        ClimateZone::Temperate => &[
            BiomeType::TemperateForest,
            BiomeType::TemperateForest,
            BiomeType::Grassland,
            BiomeType::Wetland,
        ],
        ClimateZone::Subtropical => &[BiomeType::Desert, BiomeType::Desert, BiomeType::Savanna],
        ClimateZone::Tropical => &[
            BiomeType::Rainforest,
            BiomeType::Rainforest,
            BiomeType::Wetland,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn coord_id_conversion() {
        let grid = RegionalGrid::new(10, 5, BiomeType::Grassland);
        assert_eq!(grid.len(), 50);
        let id = grid.id_at(Coord::new(3, 2)).unwrap();
        assert_eq!(id, RegionId(23));
        assert_eq!(grid.region(id).unwrap().coordinates, Coord::new(3, 2));
        assert!(grid.id_at(Coord::new(10, 0)).is_none());
        assert!(grid.id_at(Coord::new(-1, 0)).is_none());
    }

    #[test]
    fn neighbors_respect_edges() {
        let grid = RegionalGrid::new(10, 5, BiomeType::Grassland);
        let corner = grid.id_at(Coord::new(0, 0)).unwrap();
        assert_eq!(grid.neighbors(corner).len(), 2);
        let middle = grid.id_at(Coord::new(5, 2)).unwrap();
        assert_eq!(grid.neighbors(middle).len(), 4);
    }

    #[test]
    fn within_radius_uses_euclidean_distance() {
        let grid = RegionalGrid::new(30, 30, BiomeType::Grassland);
        let hits = grid.within_radius(Coord::new(0, 0), 3.0);
        assert!(hits.iter().all(|(_, d)| *d <= 3.0));
        let diagonal = grid.id_at(Coord::new(2, 2)).unwrap();
        assert!(hits.iter().any(|(id, _)| *id == diagonal));
        let corner = grid.id_at(Coord::new(3, 3)).unwrap();
        assert!(hits.iter().all(|(id, _)| *id != corner));
    }

    #[test]
    fn huge_radius_is_clipped_to_the_grid() {
        let grid = RegionalGrid::new(4, 4, BiomeType::Grassland);
        assert_eq!(grid.within_radius(Coord::new(2, 2), 3.0e9).len(), 16);
        assert_eq!(grid.within_radius(Coord::new(2, 2), f32::INFINITY).len(), 16);
        assert_eq!(grid.within_radius(Coord::new(0, 0), 3000.0).len(), 16);
        assert!(grid.within_radius(Coord::new(1, 1), f32::NAN).is_empty());

        let far = grid.within_radius(Coord::new(i32::MAX, i32::MIN), 1.0);
        assert!(far.is_empty());
    }

    #[test]
    fn generation_is_seeded() {
        let a = RegionalGrid::generate(16, 12, &mut ChaCha8Rng::seed_from_u64(3));
        let b = RegionalGrid::generate(16, 12, &mut ChaCha8Rng::seed_from_u64(3));
        let biomes_a: Vec<_> = a.regions().iter().map(|r| r.biome).collect();
        let biomes_b: Vec<_> = b.regions().iter().map(|r| r.biome).collect();
        assert_eq!(biomes_a, biomes_b);
        assert_eq!(a.biome_distribution().iter().sum::<usize>(), 16 * 12);
    }

    #[test]
    fn uniform_grid_is_fully_contiguous() {
        let grid = RegionalGrid::new(4, 4, BiomeType::Desert);
        assert_eq!(grid.contiguity(), 1.0);
    }
}
