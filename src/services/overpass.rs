use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use log::*;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::GeoPoint;
use crate::{GenericError, NearMeError};

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
/// Evaluation limit embedded in the query text, in seconds.
pub const QUERY_TIMEOUT_SECONDS: u32 = 25;
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// What to look for: every node, way and relation tagged `amenity=<amenity>`
/// within `radius_m` metres of `origin`.
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityQuery {
    pub origin: GeoPoint,
    pub radius_m: i64,
    pub amenity: String,
}

impl AmenityQuery {
    pub fn new(origin: GeoPoint, radius_km: f64, amenity: &str) -> Self {
        AmenityQuery {
            origin,
            // Truncates toward zero.
            radius_m: (radius_km * 1000.0) as i64,
            amenity: amenity.to_string(),
        }
    }

    /// Renders the query as Overpass QL.
    pub fn to_overpass_ql(&self) -> String {
        let filter = format!(
            "[\"amenity\"=\"{}\"](around:{},{},{})",
            escape_quoted(&self.amenity),
            self.radius_m,
            self.origin.latitude,
            self.origin.longitude
        );
        let selectors = ["node", "way", "relation"]
            .iter()
            .map(|element_type| format!("  {element_type}{filter};"))
            .collect::<Vec<_>>()
            .join("\n");

        format!("[out:json][timeout:{QUERY_TIMEOUT_SECONDS}];\n(\n{selectors}\n);\nout center;")
    }
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Center {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub id: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RawElement {
    /// Nodes carry their own position; ways and relations only their centroid.
    pub fn coordinate(&self) -> Option<GeoPoint> {
        let (lat, lon) = match self.element_type {
            ElementType::Node => (self.lat, self.lon),
            _ => {
                let center = self.center.as_ref()?;
                (center.lat, center.lon)
            }
        };
        Some(GeoPoint::unchecked(lat?, lon?))
    }

    /// Tag value, treating an empty string the same as a missing tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<RawElement>,
}

#[async_trait]
pub trait AmenitySource {
    async fn fetch_elements(&self, query: &AmenityQuery) -> Result<Vec<RawElement>, NearMeError>;
}

pub struct OverpassService {
    client: Client,
    endpoint: Url,
}

impl OverpassService {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, GenericError> {
        Ok(OverpassService {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: Url::parse(endpoint)?,
        })
    }
}

#[async_trait]
impl AmenitySource for OverpassService {
    async fn fetch_elements(&self, query: &AmenityQuery) -> Result<Vec<RawElement>, NearMeError> {
        trace!(
            "Querying Overpass for amenity={} within {} m of ({}, {}).",
            query.amenity,
            query.radius_m,
            query.origin.latitude,
            query.origin.longitude
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .body(query.to_overpass_ql())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            let error = map_status_error(status, &body);
            warn!("{error}");
            return Err(error);
        }

        let elements = parse_elements(&body)?;
        for element in elements.iter().filter(|e| e.coordinate().is_none()) {
            trace!(
                "Overpass element {:?} ({:?}) has no resolvable coordinate.",
                element.id,
                element.element_type
            );
        }
        debug!("Overpass returned {} elements.", elements.len());
        Ok(elements)
    }
}

fn parse_elements(body: &[u8]) -> Result<Vec<RawElement>, NearMeError> {
    let response: OverpassResponse = serde_json::from_slice(body).map_err(|error| {
        warn!("Could not decode Overpass response: {error}");
        NearMeError::MalformedResponse(error.to_string())
    })?;
    Ok(response.elements)
}

fn map_transport_error(error: reqwest::Error) -> NearMeError {
    if error.is_timeout() {
        warn!("Overpass request timed out: {error}");
    } else {
        warn!("Overpass request failed: {error}");
    }
    NearMeError::BackendUnavailable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> NearMeError {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    NearMeError::BackendRejected {
        status: status.as_u16(),
        detail: compact.chars().take(PREVIEW_CHAR_LIMIT).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hospital_query() -> AmenityQuery {
        AmenityQuery::new(GeoPoint::unchecked(12.9716, 77.5946), 5.0, "hospital")
    }

    async fn service_for(server: &MockServer, timeout: Duration) -> OverpassService {
        OverpassService::new(&format!("{}/api/interpreter", server.uri()), timeout).unwrap()
    }

    #[test]
    fn truncates_radius_to_whole_metres() {
        let query = AmenityQuery::new(GeoPoint::unchecked(0.0, 0.0), 1.2345, "police");
        assert_eq!(query.radius_m, 1234);
    }

    #[test]
    fn renders_three_selectors_with_timeout_and_center_output() {
        let ql = hospital_query().to_overpass_ql();

        assert!(ql.starts_with("[out:json][timeout:25];"));
        assert!(ql.ends_with("out center;"));
        for element_type in ["node", "way", "relation"] {
            let selector =
                format!("{element_type}[\"amenity\"=\"hospital\"](around:5000,12.9716,77.5946);");
            assert!(ql.contains(&selector), "missing {selector} in {ql}");
        }
    }

    #[test]
    fn escapes_quotes_in_amenity_values() {
        let query = AmenityQuery::new(GeoPoint::unchecked(0.0, 0.0), 1.0, "a\"b");
        assert!(query.to_overpass_ql().contains("[\"amenity\"=\"a\\\"b\"]"));
    }

    #[test]
    fn resolves_coordinates_by_element_type() {
        let body = r#"{
            "elements": [
                { "type": "node", "id": 1, "lat": 1.0, "lon": 2.0 },
                { "type": "way", "id": 2, "center": { "lat": 3.0, "lon": 4.0 } },
                { "type": "relation", "id": 3 },
                { "type": "node", "id": 4, "center": { "lat": 5.0, "lon": 6.0 } },
                { "type": "way", "id": 5, "lat": 7.0, "lon": 8.0 }
            ]
        }"#;
        let coordinates = parse_elements(body.as_bytes())
            .unwrap()
            .iter()
            .map(RawElement::coordinate)
            .collect::<Vec<_>>();

        assert_eq!(
            coordinates,
            vec![
                Some(GeoPoint::unchecked(1.0, 2.0)),
                Some(GeoPoint::unchecked(3.0, 4.0)),
                None,
                None,
                None,
            ]
        );
    }

    #[test]
    fn missing_elements_decode_as_empty() {
        assert!(parse_elements(br#"{"version": 0.6}"#).unwrap().is_empty());
    }

    #[test]
    fn non_json_bodies_are_malformed() {
        assert!(matches!(
            parse_elements(b"<html>busy</html>"),
            Err(NearMeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_tags_are_treated_as_absent() {
        let element: RawElement = serde_json::from_str(
            r#"{ "type": "node", "lat": 0, "lon": 0, "tags": { "name": "", "operator": "City" } }"#,
        )
        .unwrap();
        assert_eq!(element.tag("name"), None);
        assert_eq!(element.tag("operator"), Some("City"));
        assert_eq!(element.element_type, ElementType::Node);
    }

    #[tokio::test]
    async fn posts_the_query_and_decodes_elements() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .and(body_string_contains("node[\"amenity\"=\"hospital\"]"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"elements": [{"type": "node", "id": 7, "lat": 12.97, "lon": 77.6, "tags": {"name": "St. John's"}}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let elements = service_for(&server, TRANSPORT_TIMEOUT)
            .await
            .fetch_elements(&hospital_query())
            .await
            .unwrap();

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].tag("name"), Some("St. John's"));
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate   limited"))
            .mount(&server)
            .await;

        let error = service_for(&server, TRANSPORT_TIMEOUT)
            .await
            .fetch_elements(&hospital_query())
            .await
            .unwrap_err();

        match error {
            NearMeError::BackendRejected { status, detail } => {
                assert_eq!(status, 429);
                assert_eq!(detail, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_a_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"elements": []}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let error = service_for(&server, Duration::from_millis(200))
            .await
            .fetch_elements(&hospital_query())
            .await
            .unwrap_err();

        assert!(matches!(error, NearMeError::BackendUnavailable(_)));
        assert!(error.is_backend_failure());
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let server = MockServer::start().await;
        let uri = format!("{}/api/interpreter", server.uri());
        drop(server);

        let error = OverpassService::new(&uri, TRANSPORT_TIMEOUT)
            .unwrap()
            .fetch_elements(&hospital_query())
            .await
            .unwrap_err();

        assert!(matches!(error, NearMeError::BackendUnavailable(_)));
    }
}
