//! Lookup tables of the Madrid air-quality monitoring network.
//!
//! Magnitude codes and station codes follow the municipal open-data exports
//! ("Calidad del aire. Datos horarios"). The tables are built once on first use and
//! never change afterwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A pollutant measured by the network, keyed by its magnitude code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub parameter: &'static str,
    pub abbreviation: &'static str,
    pub unit: &'static str,
    pub technique_code: u16,
    pub technique: &'static str,
}

impl Indicator {
    /// Column label used for this indicator in wide frames, e.g. `dióxido de nitrógeno (µg/m 3)`.
    pub fn column_label(&self) -> String {
        format!("{} ({})", self.parameter, self.unit).to_lowercase()
    }
}

const fn indicator(
    parameter: &'static str,
    abbreviation: &'static str,
    unit: &'static str,
    technique_code: u16,
    technique: &'static str,
) -> Indicator {
    Indicator {
        parameter,
        abbreviation,
        unit,
        technique_code,
        technique,
    }
}

static INDICATORS: LazyLock<BTreeMap<u16, Indicator>> = LazyLock::new(|| {
    BTreeMap::from([
        (1, indicator("Dióxido de Azufre", "SO2", "µg/m 3", 38, "Fluorescencia ultravioleta")),
        (6, indicator("Monóxido de Carbono", "CO", "mg/m3", 48, "Absorción infrarroja")),
        (7, indicator("Monóxido de Nitrógeno", "NO", "µg/m 3", 8, "Quimioluminiscencia")),
        (8, indicator("Dióxido de Nitrógeno", "NO2", "µg/m 3", 8, "Quimioluminiscencia")),
        (9, indicator("Partículas < 2.5 µm", "PM2.5", "µg/m3", 47, "Microbalanza")),
        (10, indicator("Partículas < 10 µm", "PM10", "µg/m3", 47, "Microbalanza")),
        (12, indicator("Óxidos de Nitrógeno", "NOx", "µg/m3", 8, "Quimioluminiscencia")),
        (14, indicator("Ozono", "O3", "µg/m 3", 6, "Absorción ultravioleta")),
        (20, indicator("Tolueno", "TOL", "µg/m3", 59, "Cromatografía de gases")),
        (30, indicator("Benceno", "BEN", "µg/m3", 59, "Cromatografía de gases")),
        (35, indicator("Etilbenceno", "EBE", "µg/m3", 59, "Cromatografía de gases")),
        (37, indicator("Metaxileno", "MXY", "µg/m3", 59, "Cromatografía de gases")),
        (38, indicator("Paraxileno", "PXY", "µg/m3", 59, "Cromatografía de gases")),
        (39, indicator("Ortoxileno", "OXY", "µg/m3", 59, "Cromatografía de gases")),
        (42, indicator("Hidrocarburos totales", "TCH", "mg/m3", 2, "Ionización de llama")),
        (43, indicator("Metano", "CH4", "mg/m3", 2, "Ionización de llama")),
        (44, indicator("Hidrocarburos no metánicos", "NMHC", "mg/m3", 2, "Ionización de llama")),
        (431, indicator("MetaParaXileno", "MPX", "µg/m3", 59, "Cromatografía de gases")),
    ])
});

/// Station code → station name. Several retired codes share a name with their
/// replacement station.
static STATION_NAMES: LazyLock<BTreeMap<u16, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        (1, "Pº. Recoletos"),
        (2, "Glta. de Carlos V"),
        (3, "Pza. del Carmen"),
        (4, "Pza. de España"),
        (5, "Barrio del Pilar"),
        (6, "Pza. Dr. Marañón"),
        (7, "Pza. M. de Salamanca"),
        (8, "Escuelas Aguirre"),
        (9, "Pza. Luca de Tena"),
        (10, "Cuatro Caminos"),
        (11, "Av. Ramón y Cajal"),
        (12, "Pza. Manuel Becerra"),
        (13, "Vallecas"),
        (14, "Pza. Fdez. Ladreda"),
        (15, "Pza. Castilla"),
        (16, "Arturo Soria"),
        (17, "Villaverde Alto"),
        (18, "C/ Farolillo"),
        (19, "Huerta Castañeda"),
        (20, "Moratalaz"),
        (21, "Pza. Cristo Rey"),
        (22, "Pº. Pontones"),
        (23, "Final C/ Alcalá"),
        (24, "Casa de Campo"),
        (25, "Santa Eugenia"),
        (26, "Urb. Embajada (Barajas)"),
        (27, "Barajas"),
        (35, "Pza. del Carmen"),
        (36, "Moratalaz"),
        (38, "Cuatro Caminos"),
        (39, "Barrio del Pilar"),
        (40, "Vallecas"),
        (47, "Méndez Álvaro"),
        (48, "Pº. Castellana"),
        (49, "Retiro"),
        (50, "Pza. Castilla"),
        (54, "Ensanche Vallecas"),
        (55, "Urb. Embajada (Barajas)"),
        (56, "Plaza Elíptica"),
        (57, "Sanchinarro"),
        (58, "El Pardo"),
        (59, "Parque Juan Carlos I"),
        (60, "Tres Olivos"),
    ])
});

/// Indicator for a magnitude code.
///
/// ```
/// use madrid_air_quality::indicator_by_code;
///
/// assert_eq!(indicator_by_code(8).unwrap().abbreviation, "NO2");
/// assert!(indicator_by_code(2).is_none());
/// ```
pub fn indicator_by_code(code: u16) -> Option<&'static Indicator> {
    INDICATORS.get(&code)
}

pub fn indicators() -> impl Iterator<Item = (u16, &'static Indicator)> {
    INDICATORS.iter().map(|(code, indicator)| (*code, indicator))
}

pub fn station_name(code: u16) -> Option<&'static str> {
    STATION_NAMES.get(&code).copied()
}

pub fn station_codes() -> impl Iterator<Item = (u16, &'static str)> {
    STATION_NAMES.iter().map(|(code, name)| (*code, *name))
}

/// Abbreviation of a parameter name (`"Ozono"` → `"O3"`).
pub fn abbreviation_of(parameter: &str) -> Option<&'static str> {
    INDICATORS
        .values()
        .find(|indicator| indicator.parameter == parameter)
        .map(|indicator| indicator.abbreviation)
}

/// Parameter name of an abbreviation (`"NO2"` → `"Dióxido de Nitrógeno"`).
pub fn parameter_of(abbreviation: &str) -> Option<&'static str> {
    INDICATORS
        .values()
        .find(|indicator| indicator.abbreviation == abbreviation)
        .map(|indicator| indicator.parameter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_lookups() {
        let ozone = indicator_by_code(14).unwrap();
        assert_eq!(ozone.parameter, "Ozono");
        assert_eq!(ozone.column_label(), "ozono (µg/m 3)");
        assert_eq!(abbreviation_of("Dióxido de Nitrógeno"), Some("NO2"));
        assert_eq!(parameter_of("PM10"), Some("Partículas < 10 µm"));
        assert_eq!(parameter_of("XYZ"), None);
        assert_eq!(indicators().count(), 18);
    }

    #[test]
    fn test_retired_codes_share_names() {
        assert_eq!(station_name(49), Some("Retiro"));
        assert_eq!(station_name(38), station_name(10));
        assert_eq!(station_name(99), None);
    }
}
