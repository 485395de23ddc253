use crate::stations::error::StationsError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// A named group of air-quality stations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub stations: Vec<String>,
}

/// Ordered zone → member stations table.
///
/// The default groups the municipal network by position relative to the M-30 ring
/// road. A different grouping can be loaded from JSON:
///
/// ```
/// use madrid_air_quality::ZoneTable;
///
/// let table = ZoneTable::from_json(r#"[{"name": "Centro", "stations": ["Retiro"]}]"#).unwrap();
/// assert_eq!(table.zone_of("Retiro"), Some("Centro"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneTable {
    zones: Vec<Zone>,
}

static MADRID_ZONES: LazyLock<ZoneTable> = LazyLock::new(|| {
    let zone = |name: &str, stations: &[&str]| Zone {
        name: name.to_string(),
        stations: stations.iter().map(|s| s.to_string()).collect(),
    };
    ZoneTable::new(vec![
        zone(
            "Interior M-30",
            &[
                "Pza. de España",
                "Escuelas Aguirre",
                "Av. Ramón y Cajal",
                "Cuatro Caminos",
                "Pza. del Carmen",
                "Méndez Álvaro",
                "Pº. Castellana",
                "Retiro",
                "Pza. Castilla",
            ],
        ),
        zone("Sureste", &["Moratalaz", "Vallecas", "Ensanche Vallecas"]),
        zone(
            "Noreste",
            &[
                "Arturo Soria",
                "Barajas",
                "Urb. Embajada (Barajas)",
                "Parque Juan Carlos I",
                "Sanchinarro",
            ],
        ),
        zone(
            "Noroeste",
            &["Barrio del Pilar", "El Pardo", "Tres Olivos", "Casa de Campo"],
        ),
        zone(
            "Suroeste",
            &["C/ Farolillo", "Villaverde Alto", "Plaza Elíptica"],
        ),
    ])
});

impl ZoneTable {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// The built-in Madrid grouping.
    pub fn madrid() -> &'static ZoneTable {
        &MADRID_ZONES
    }

    pub fn from_json(json: &str) -> Result<Self, StationsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StationsError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| StationsError::ZoneFileRead(path.to_path_buf(), e))?;
        Self::from_json(&json)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn members(&self, zone: &str) -> Option<&[String]> {
        self.zones
            .iter()
            .find(|z| z.name == zone)
            .map(|z| z.stations.as_slice())
    }

    /// First zone listing `station`.
    pub fn zone_of(&self, station: &str) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.stations.iter().any(|s| s == station))
            .map(|z| z.name.as_str())
    }
}

impl Default for ZoneTable {
    fn default() -> Self {
        MADRID_ZONES.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_zones() {
        let table = ZoneTable::madrid();
        let names: Vec<&str> = table.zones().iter().map(|z| z.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Interior M-30", "Sureste", "Noreste", "Noroeste", "Suroeste"]
        );
        assert_eq!(table.zone_of("Retiro"), Some("Interior M-30"));
        assert_eq!(table.zone_of("El Pardo"), Some("Noroeste"));
        assert_eq!(table.zone_of("Nowhere"), None);
        assert_eq!(table.members("Sureste").map(<[String]>::len), Some(3));
    }

    #[test]
    fn test_from_json_keeps_order() -> Result<(), Box<dyn std::error::Error>> {
        let table = ZoneTable::from_json(
            r#"[{"name": "B", "stations": ["x"]}, {"name": "A", "stations": ["y", "z"]}]"#,
        )?;
        assert_eq!(table.zones()[0].name, "B");
        assert_eq!(table.zone_of("z"), Some("A"));
        Ok(())
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(matches!(
            ZoneTable::from_json(r#"{"name": "A"}"#),
            Err(StationsError::ZoneJson(_))
        ));
    }

    #[test]
    fn test_from_json_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("zones.json");
        std::fs::write(&path, r#"[{"name": "Centro", "stations": ["Retiro"]}]"#)?;
        let table = ZoneTable::from_json_file(&path)?;
        assert_eq!(table.members("Centro"), Some(&["Retiro".to_string()][..]));
        assert!(ZoneTable::from_json_file(&dir.path().join("missing.json")).is_err());
        Ok(())
    }
}
