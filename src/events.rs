//! Event records for the two ingested streams
//!
//! Weather-risk telemetry and social-media reports arrive as loosely-typed
//! JSON from the broker. They are decoded once, here, into typed records
//! with every missing field defaulted, so downstream code never re-checks
//! for absent data.

use crate::error::{CrisisError, CrisisResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Broker topic carrying weather-risk telemetry
pub const WEATHER_TOPIC: &str = "weather_risks";
/// Broker topic carrying social-media reports
pub const SOCIAL_TOPIC: &str = "social_signals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Weather,
    Social,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Weather => "weather",
            StreamKind::Social => "social",
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            StreamKind::Weather => WEATHER_TOPIC,
            StreamKind::Social => SOCIAL_TOPIC,
        }
    }

    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            WEATHER_TOPIC => Some(StreamKind::Weather),
            SOCIAL_TOPIC => Some(StreamKind::Social),
            _ => None,
        }
    }
}

/// Weather risk classification, ordered by severity (`Low < Critical`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Numeric severity used by intensity scoring
    pub fn score(&self) -> f64 {
        match self {
            RiskLevel::Critical => 100.0,
            RiskLevel::High => 75.0,
            RiskLevel::Moderate => 50.0,
            RiskLevel::Low => 25.0,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => RiskLevel::Critical,
            "high" => RiskLevel::High,
            "moderate" | "medium" => RiskLevel::Moderate,
            _ => RiskLevel::Low,
        }
    }
}

/// Social report urgency, ordered by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    pub fn score(&self) -> f64 {
        self.as_risk_level().score()
    }

    pub fn as_risk_level(&self) -> RiskLevel {
        match self {
            Urgency::Low => RiskLevel::Low,
            Urgency::Medium => RiskLevel::Moderate,
            Urgency::High => RiskLevel::High,
            Urgency::Critical => RiskLevel::Critical,
        }
    }
}

impl From<String> for Urgency {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => Urgency::Critical,
            "high" => Urgency::High,
            "medium" | "moderate" => Urgency::Medium,
            _ => Urgency::Low,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(
        default,
        deserialize_with = "lenient_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { name: None, lat, lon }
    }

    /// False when either coordinate is the 0 placeholder substituted for a
    /// missing value
    pub fn has_coordinates(&self) -> bool {
        self.lat != 0.0 && self.lon != 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherData {
    #[serde(deserialize_with = "lenient_f64")]
    pub fire_index: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub flood_index: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub temperature: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub humidity: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub wind_speed: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub wind_direction: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub precipitation_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRiskEvent {
    #[serde(default = "unknown", deserialize_with = "lenient_unknown")]
    pub event_id: String,
    #[serde(default = "unknown", deserialize_with = "lenient_unknown")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_object")]
    pub location: Location,
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: WeatherData,
    #[serde(default, deserialize_with = "lenient_level")]
    pub risk_level: RiskLevel,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialData {
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default = "unknown", deserialize_with = "lenient_unknown")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_level")]
    pub urgency: Urgency,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub verified: bool,
}

impl Default for SocialData {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: unknown(),
            urgency: Urgency::Low,
            verified: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialSignalEvent {
    #[serde(default = "unknown", deserialize_with = "lenient_unknown")]
    pub event_id: String,
    #[serde(default = "social", deserialize_with = "lenient_social_source")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_object")]
    pub location: Location,
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: SocialData,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// A decoded event from either stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CrisisEvent {
    Weather(WeatherRiskEvent),
    Social(SocialSignalEvent),
}

impl CrisisEvent {
    pub fn stream(&self) -> StreamKind {
        match self {
            CrisisEvent::Weather(_) => StreamKind::Weather,
            CrisisEvent::Social(_) => StreamKind::Social,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            CrisisEvent::Weather(e) => &e.event_id,
            CrisisEvent::Social(e) => &e.event_id,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            CrisisEvent::Weather(e) => &e.location,
            CrisisEvent::Social(e) => &e.location,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CrisisEvent::Weather(e) => e.timestamp,
            CrisisEvent::Social(e) => e.timestamp,
        }
    }

    /// Severity score: `risk_level` for weather, `urgency` for social reports
    pub fn severity_score(&self) -> f64 {
        match self {
            CrisisEvent::Weather(e) => e.risk_level.score(),
            CrisisEvent::Social(e) => e.data.urgency.score(),
        }
    }

    /// Crisis category this event points at
    ///
    /// Social reports carry their own category; weather readings are `fire`
    /// when the fire index exceeds the flood index, otherwise `flood`.
    pub fn crisis_type(&self) -> &str {
        match self {
            CrisisEvent::Social(e) => &e.data.category,
            CrisisEvent::Weather(e) if e.data.fire_index > e.data.flood_index => "fire",
            CrisisEvent::Weather(_) => "flood",
        }
    }
}

impl From<WeatherRiskEvent> for CrisisEvent {
    fn from(event: WeatherRiskEvent) -> Self {
        CrisisEvent::Weather(event)
    }
}

impl From<SocialSignalEvent> for CrisisEvent {
    fn from(event: SocialSignalEvent) -> Self {
        CrisisEvent::Social(event)
    }
}

/// One line of broker output: the topic it arrived on plus the raw payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEnvelope {
    pub topic: String,
    pub event: Value,
}

/// Decode a raw payload from `kind`'s stream into a typed event
///
/// Missing, null and wrong-typed fields are defaulted and numeric strings
/// are accepted. Only payloads that are not JSON objects are rejected.
pub fn decode_event(kind: StreamKind, payload: Value) -> CrisisResult<CrisisEvent> {
    if !payload.is_object() {
        return Err(CrisisError::Serialization(de::Error::custom(format!(
            "expected a JSON object, got {}",
            payload
        ))));
    }

    let event = match kind {
        StreamKind::Weather => CrisisEvent::Weather(serde_json::from_value(payload)?),
        StreamKind::Social => CrisisEvent::Social(serde_json::from_value(payload)?),
    };
    Ok(event)
}

/// Parse RFC 3339, naive ISO-8601 (taken as UTC) or epoch seconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value).unwrap_or_else(|| {
        log::debug!("Unparsable event timestamp {}, using ingestion time", value);
        Utc::now()
    }))
}

/// Number or numeric string; anything else (or a non-finite value) is 0
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()).unwrap_or(0.0))
}

fn string_or(value: Value, default: impl FnOnce() -> String) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => default(),
    }
}

fn lenient_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_or(Value::deserialize(deserializer)?, unknown))
}

fn lenient_social_source<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_or(Value::deserialize(deserializer)?, social))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_or(Value::deserialize(deserializer)?, String::new))
}

fn lenient_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Risk level or urgency from its name; non-strings fall back to the default
fn lenient_level<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String> + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => T::from(s),
        _ => T::default(),
    })
}

/// Nested record; anything but an object becomes the default record
fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(de::Error::custom),
        _ => Ok(T::default()),
    }
}

fn unknown() -> String {
    "unknown".to_string()
}

fn social() -> String {
    "social".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decode_full_weather_event() {
        let payload = json!({
            "event_id": "w-1",
            "source": "tomorrow.io",
            "location": {"name": "Houston", "lat": 29.76, "lon": -95.37},
            "data": {
                "fire_index": 12, "flood_index": 81.5, "temperature": 24.0,
                "humidity": 93, "wind_speed": 7.2, "wind_direction": 140,
                "precipitation_intensity": 38.0
            },
            "risk_level": "critical",
            "timestamp": "2024-09-01T12:30:00+00:00"
        });

        let event = decode_event(StreamKind::Weather, payload).unwrap();
        let CrisisEvent::Weather(w) = &event else {
            panic!("expected weather event");
        };
        assert_eq!(w.location.name.as_deref(), Some("Houston"));
        assert_eq!(w.data.flood_index, 81.5);
        assert_eq!(w.risk_level, RiskLevel::Critical);
        assert_eq!(w.timestamp, Utc.with_ymd_and_hms(2024, 9, 1, 12, 30, 0).unwrap());
        assert_eq!(event.crisis_type(), "flood");
        assert_eq!(event.severity_score(), 100.0);
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        // Test: Partial records are accepted with defaults substituted
        let event = decode_event(StreamKind::Social, json!({"data": {"urgency": "medium"}})).unwrap();
        let CrisisEvent::Social(s) = &event else {
            panic!("expected social event");
        };
        assert_eq!(s.event_id, "unknown");
        assert_eq!(s.source, "social");
        assert_eq!(s.location, Location::default());
        assert_eq!(s.data.category, "unknown");
        assert_eq!(s.data.urgency, Urgency::Medium);
        assert!(!s.data.verified);
        assert_eq!(event.severity_score(), 50.0);

        let event = decode_event(StreamKind::Weather, json!({"risk_level": "apocalyptic"})).unwrap();
        assert_eq!(event.severity_score(), 25.0);
        assert_eq!(event.crisis_type(), "flood");
    }

    #[test]
    fn test_decode_defaults_null_and_wrong_typed_fields() {
        // Test: Present-but-unusable values are defaulted instead of dropping the event
        let event = decode_event(
            StreamKind::Weather,
            json!({
                "event_id": null,
                "location": {"name": 7, "lat": "34.05", "lon": " -118.24 "},
                "data": {"fire_index": null, "flood_index": "80", "humidity": [1], "wind_speed": "NaN"},
                "risk_level": null
            }),
        )
        .unwrap();
        let CrisisEvent::Weather(w) = &event else {
            panic!("expected weather event");
        };
        assert_eq!(w.event_id, "unknown");
        assert_eq!(w.location.name, None);
        assert_eq!(w.location.lat, 34.05);
        assert_eq!(w.location.lon, -118.24);
        assert_eq!(w.data.fire_index, 0.0);
        assert_eq!(w.data.flood_index, 80.0);
        assert_eq!(w.data.humidity, 0.0);
        assert_eq!(w.data.wind_speed, 0.0);
        assert_eq!(w.risk_level, RiskLevel::Low);
        assert_eq!(event.crisis_type(), "flood");

        let event = decode_event(
            StreamKind::Weather,
            json!({"location": null, "data": "n/a", "risk_level": 3}),
        )
        .unwrap();
        assert_eq!(event.location(), &Location::default());
        assert_eq!(event.severity_score(), 25.0);

        let event = decode_event(
            StreamKind::Social,
            json!({
                "source": null,
                "data": {"text": null, "category": null, "urgency": {"level": 4}, "verified": "true"}
            }),
        )
        .unwrap();
        let CrisisEvent::Social(s) = &event else {
            panic!("expected social event");
        };
        assert_eq!(s.source, "social");
        assert_eq!(s.data.text, "");
        assert_eq!(s.data.category, "unknown");
        assert_eq!(s.data.urgency, Urgency::Low);
        assert!(s.data.verified);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(decode_event(StreamKind::Weather, json!("not an event")).is_err());
        assert!(decode_event(StreamKind::Social, json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp(&json!("2024-01-02T03:04:05Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-02T03:04:05.000000")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-02 03:04:05")), Some(expected));
        assert_eq!(parse_timestamp(&json!(expected.timestamp())), Some(expected));
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Moderate);
        assert!(RiskLevel::Moderate > RiskLevel::Low);
        assert_eq!(Urgency::Medium.as_risk_level(), RiskLevel::Moderate);
    }

    #[test]
    fn test_topic_routing() {
        assert_eq!(StreamKind::from_topic("weather_risks"), Some(StreamKind::Weather));
        assert_eq!(StreamKind::from_topic("social_signals"), Some(StreamKind::Social));
        assert_eq!(StreamKind::from_topic("other"), None);
        assert_eq!(StreamKind::Social.topic(), SOCIAL_TOPIC);
    }
}
