use crate::frame::{f64_values, has_column, require_columns, string_values, FrameError};
use crate::geo::distance::LatLon;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// An air-quality monitoring station with its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirStation {
    pub code: Option<i64>,
    pub name: String,
    pub position: LatLon,
    pub zone: Option<String>,
}

/// A traffic measurement point after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficStation {
    /// `cod_cent`
    pub code: String,
    pub name: Option<String>,
    pub element_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub year: i32,
}

impl TrafficStation {
    pub fn position(&self) -> Option<LatLon> {
        Some(LatLon(self.latitude?, self.longitude?))
    }
}

/// Air stations of a locations frame, identified by the `name_column` values.
///
/// Needs `name_column`, `latitud` and `longitud`; `codigo_corto` and `zone` are read
/// when present. Rows without a name or a full coordinate pair are skipped.
pub fn air_stations_from_frame(
    df: &DataFrame,
    name_column: &str,
) -> Result<Vec<AirStation>, FrameError> {
    require_columns(df, &[name_column, "latitud", "longitud"])?;
    let names = string_values(df, name_column)?;
    let latitudes = f64_values(df, "latitud")?;
    let longitudes = f64_values(df, "longitud")?;
    let codes: Vec<Option<i64>> = if has_column(df, "codigo_corto") {
        f64_values(df, "codigo_corto")?
            .into_iter()
            .map(|code| code.map(|c| c as i64))
            .collect()
    } else {
        vec![None; df.height()]
    };
    let zones = if has_column(df, "zone") {
        string_values(df, "zone")?
    } else {
        vec![None; df.height()]
    };

    let mut stations = Vec::with_capacity(df.height());
    for (i, name) in names.into_iter().enumerate() {
        let (Some(name), Some(lat), Some(lon)) = (name, latitudes[i], longitudes[i]) else {
            continue;
        };
        stations.push(AirStation {
            code: codes[i],
            name,
            position: LatLon(lat, lon),
            zone: zones[i].clone(),
        });
    }
    Ok(stations)
}

/// Frame with columns `cod_cent, nombre, tipo_elem, latitud, longitud, year`.
pub fn traffic_stations_to_frame(stations: &[TrafficStation]) -> Result<DataFrame, FrameError> {
    let column = |name: &str, values: Vec<Option<String>>| -> Column {
        Series::new(name.into(), values).into()
    };
    Ok(DataFrame::new(vec![
        column(
            "cod_cent",
            stations.iter().map(|s| Some(s.code.clone())).collect(),
        ),
        column("nombre", stations.iter().map(|s| s.name.clone()).collect()),
        column(
            "tipo_elem",
            stations.iter().map(|s| s.element_type.clone()).collect(),
        ),
        Series::new(
            "latitud".into(),
            stations.iter().map(|s| s.latitude).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "longitud".into(),
            stations.iter().map(|s| s.longitude).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            stations.iter().map(|s| s.year).collect::<Vec<_>>(),
        )
        .into(),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column_names;

    #[test]
    fn test_air_stations_from_frame() -> Result<(), Box<dyn std::error::Error>> {
        let df = df!(
            "codigo_corto" => [4, 8, 11],
            "estacion" => [Some("Pza. de España"), Some("Escuelas Aguirre"), None],
            "latitud" => [40.424, 40.421, 40.451],
            "longitud" => [-3.712, -3.682, -3.677],
        )?;
        let stations = air_stations_from_frame(&df, "estacion")?;
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].code, Some(4));
        assert_eq!(stations[1].name, "Escuelas Aguirre");
        assert_eq!(stations[1].zone, None);
        assert_eq!(stations[1].position, LatLon(40.421, -3.682));
        Ok(())
    }

    #[test]
    fn test_traffic_stations_to_frame() -> Result<(), Box<dyn std::error::Error>> {
        let stations = vec![TrafficStation {
            code: "01001".to_string(),
            name: Some("Castellana".to_string()),
            element_type: Some("URB".to_string()),
            latitude: Some(40.43),
            longitude: None,
            year: 2021,
        }];
        let df = traffic_stations_to_frame(&stations)?;
        assert_eq!(
            column_names(&df),
            vec!["cod_cent", "nombre", "tipo_elem", "latitud", "longitud", "year"]
        );
        assert_eq!(df.column("longitud")?.null_count(), 1);
        assert_eq!(stations[0].position(), None);
        Ok(())
    }
}
