use serde::{Deserialize, Deserializer, Serialize};

// Response model served to clients. Field names follow the layout the
// dashboard already reads.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub main: Measurements,
    pub wind: Wind,
    pub sys: SunTimes,
    pub name: String,
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub temp_min: f64,
    pub temp_max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

/// Sunrise and sunset as epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: i64,
    pub sunset: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Short label, e.g. "Clouds".
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub list: Vec<ForecastEntry>,
    pub city: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub dt: i64,
    pub main: Measurements,
    pub weather: Vec<Condition>,
    pub wind: Wind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub country: String,
}

// OpenWeather payloads, reduced to the fields the response model needs.
// Absent or null fields take their zero value; anything else in the
// document is ignored.

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwCurrentResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub weather: Vec<OwWeather>,
    #[serde(deserialize_with = "null_as_default")]
    pub main: OwMain,
    #[serde(deserialize_with = "null_as_default")]
    pub wind: OwWind,
    #[serde(deserialize_with = "null_as_default")]
    pub sys: OwSys,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwWeather {
    #[serde(deserialize_with = "null_as_default")]
    pub main: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwMain {
    #[serde(deserialize_with = "null_as_default")]
    pub temp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub temp_min: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub temp_max: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub pressure: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub humidity: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwWind {
    #[serde(deserialize_with = "null_as_default")]
    pub speed: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwSys {
    #[serde(deserialize_with = "null_as_default")]
    pub sunrise: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub sunset: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwForecastResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub list: Vec<OwForecastItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub city: OwCity,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwForecastItem {
    #[serde(deserialize_with = "null_as_default")]
    pub dt: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub main: OwMain,
    #[serde(deserialize_with = "null_as_default")]
    pub weather: Vec<OwWeather>,
    #[serde(deserialize_with = "null_as_default")]
    pub wind: OwWind,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwCity {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
}
