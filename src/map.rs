use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::MapError;

pub type PunterId = usize;
pub type SiteId = usize;
pub type RiverId = usize;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Site {
    pub id: SiteId,

    // Cosmetic, only kept so that visualisers get them back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Site {
    pub fn new(id: SiteId) -> Site {
        Site { id, x: None, y: None }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct River {
    pub source: SiteId,
    pub target: SiteId,
}

impl River {
    pub fn new(source: SiteId, target: SiteId) -> River {
        River { source, target }
    }

    /// The endpoints in ascending order, so `(a, b)` and `(b, a)` compare equal.
    pub fn key(&self) -> (SiteId, SiteId) {
        if self.source <= self.target {
            (self.source, self.target)
        } else {
            (self.target, self.source)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Map {
    pub sites: Vec<Site>,
    pub rivers: Vec<River>,
    pub mines: Vec<SiteId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub futures: bool,
    #[serde(default)]
    pub splurges: bool,
    #[serde(default)]
    pub options: bool,
}

impl Map {
    /// Load and validate a JSON map file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Map, MapError> {
        let data = fs::read(path)?;
        Map::from_slice(&data)
    }

    pub fn from_slice(data: &[u8]) -> Result<Map, MapError> {
        let map: Map = serde_json::from_slice(data)?;
        map.validate()?;
        Ok(map)
    }

    /// Check that the topology is well formed: unique sites, unique mines and
    /// river endpoints that name known sites, no duplicate or looping rivers.
    pub fn validate(&self) -> Result<(), MapError> {
        let mut sites = HashSet::with_capacity(self.sites.len());
        for site in &self.sites {
            if !sites.insert(site.id) {
                return Err(MapError::DuplicateSite(site.id));
            }
        }

        let mut mines = HashSet::with_capacity(self.mines.len());
        for &mine in &self.mines {
            if !sites.contains(&mine) {
                return Err(MapError::UnknownMine(mine));
            }
            if !mines.insert(mine) {
                return Err(MapError::DuplicateMine(mine));
            }
        }

        let mut rivers = HashSet::with_capacity(self.rivers.len());
        for river in &self.rivers {
            if !sites.contains(&river.source) || !sites.contains(&river.target) {
                return Err(MapError::UnknownSite(river.source, river.target));
            }
            if river.source == river.target {
                return Err(MapError::SelfLoop(river.source));
            }
            if !rivers.insert(river.key()) {
                return Err(MapError::DuplicateRiver(river.source, river.target));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The sample map used by the reference server: eight sites on a ring
    /// with two chords and mines at 1 and 5.
    pub(crate) const SAMPLE: &str = r#"{
        "sites":[{"id":4,"x":2.0,"y":-2.0},{"id":1},{"id":3},{"id":6},
                 {"id":5},{"id":0},{"id":7},{"id":2}],
        "rivers":[{"source":3,"target":4},{"source":0,"target":1},{"source":2,"target":3},
                  {"source":1,"target":3},{"source":5,"target":6},{"source":4,"target":5},
                  {"source":3,"target":5},{"source":6,"target":7},{"source":5,"target":7},
                  {"source":1,"target":7},{"source":0,"target":7},{"source":1,"target":2}],
        "mines":[1,5]
    }"#;

    /// Three sites in a line with a mine at one end.
    pub(crate) fn line() -> Map {
        Map {
            sites: vec![Site::new(0), Site::new(1), Site::new(2)],
            rivers: vec![River::new(0, 1), River::new(1, 2)],
            mines: vec![0],
        }
    }

    #[test]
    fn parses_sample() {
        let map = Map::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(map.sites.len(), 8);
        assert_eq!(map.rivers.len(), 12);
        assert_eq!(map.mines, vec![1, 5]);
        assert_eq!(map.sites[0].x, Some(2.0));
    }

    #[test]
    fn rejects_unknown_mine() {
        let mut map = line();
        map.mines.push(9);
        assert!(matches!(map.validate(), Err(MapError::UnknownMine(9))));
    }

    #[test]
    fn rejects_duplicate_mine() {
        let mut map = line();
        map.mines.push(0);
        assert!(matches!(map.validate(), Err(MapError::DuplicateMine(0))));
    }

    #[test]
    fn rejects_dangling_river() {
        let mut map = line();
        map.rivers.push(River::new(2, 3));
        assert!(matches!(map.validate(), Err(MapError::UnknownSite(2, 3))));
    }

    #[test]
    fn rejects_reversed_duplicate_river() {
        let mut map = line();
        map.rivers.push(River::new(1, 0));
        assert!(matches!(map.validate(), Err(MapError::DuplicateRiver(1, 0))));
    }

    #[test]
    fn rejects_self_loop() {
        let mut map = line();
        map.rivers.push(River::new(2, 2));
        assert!(matches!(map.validate(), Err(MapError::SelfLoop(2))));
    }

    #[test]
    fn settings_default_to_off() {
        let settings: Settings = serde_json::from_str(r#"{"options":true}"#).unwrap();
        assert_eq!(
            settings,
            Settings {
                futures: false,
                splurges: false,
                options: true,
            }
        );
    }
}
