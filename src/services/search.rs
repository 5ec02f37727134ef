use derive_more::Display;

use super::{
    distance::distance_km,
    overpass::{AmenityQuery, AmenitySource, RawElement},
    AmenityResult, GeoPoint,
};
use crate::NearMeError;

pub const DEFAULT_MAX_RESULTS: usize = 6;

const UNKNOWN_NAME: &str = "Unknown";
const NOT_AVAILABLE: &str = "Not available";
const NAME_TAGS: [&str; 2] = ["name", "operator"];
const CONTACT_TAGS: [&str; 3] = ["phone", "contact:phone", "telephone"];
const ADDRESS_TAGS: [&str; 6] = [
    "addr:street",
    "addr:housenumber",
    "addr:city",
    "addr:postcode",
    "addr:state",
    "addr:country",
];
const FULL_ADDRESS_TAG: &str = "addr:full";

/// The amenity kinds the host exposes; `Display` yields the OSM `amenity` tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AmenityKind {
    #[display(fmt = "hospital")]
    Hospital,
    #[display(fmt = "police")]
    Police,
    #[display(fmt = "fire_station")]
    FireStation,
    #[display(fmt = "townhall")]
    PublicOffice,
}

pub struct AmenitySearchEngine {
    source: Box<dyn AmenitySource + Send + Sync>,
    max_results: usize,
}

impl AmenitySearchEngine {
    pub fn new(source: Box<dyn AmenitySource + Send + Sync>, max_results: usize) -> Self {
        AmenitySearchEngine {
            source,
            max_results,
        }
    }

    /// Nearest `amenity` elements within `radius_km` of `origin`, closest first.
    ///
    /// Any backend failure is returned as-is; there are no partial results.
    pub async fn search(
        &self,
        origin: GeoPoint,
        radius_km: f64,
        amenity: &str,
    ) -> Result<Vec<AmenityResult>, NearMeError> {
        let query = AmenityQuery::new(origin, radius_km, amenity);
        let elements = self.source.fetch_elements(&query).await?;

        let results = elements
            .iter()
            .filter_map(|element| normalize(origin, element))
            .collect();
        Ok(rank(results, self.max_results))
    }
}

/// Turns one backend element into a result, or `None` when its position is unresolved.
pub fn normalize(origin: GeoPoint, element: &RawElement) -> Option<AmenityResult> {
    let position = element.coordinate()?;

    let name = first_tag(element, &NAME_TAGS).unwrap_or(UNKNOWN_NAME);
    let contact = first_tag(element, &CONTACT_TAGS).unwrap_or(NOT_AVAILABLE);

    Some(AmenityResult {
        name: name.to_string(),
        address: address(element),
        contact: contact.to_string(),
        lat: position.latitude,
        lon: position.longitude,
        distance_km: distance_km(origin, position),
    })
}

fn first_tag<'a>(element: &'a RawElement, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| element.tag(key))
}

fn address(element: &RawElement) -> String {
    let parts = ADDRESS_TAGS
        .iter()
        .filter_map(|key| element.tag(key))
        .collect::<Vec<_>>();
    if !parts.is_empty() {
        return parts.join(", ");
    }
    element
        .tag(FULL_ADDRESS_TAG)
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Stable sort by distance, then keep the first `max_results`.
fn rank(mut results: Vec<AmenityResult>, max_results: usize) -> Vec<AmenityResult> {
    results.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    results.truncate(max_results);
    results
}
