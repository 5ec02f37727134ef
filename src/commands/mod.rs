use std::str::FromStr;

use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::Config,
    services::{
        search::{AmenityKind, AmenitySearchEngine},
        AmenityResult, GeoPoint,
    },
    NearMeError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    FindNearest(AmenityKind),
    Validate,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::FindNearest(AmenityKind::Hospital),
        Tool::FindNearest(AmenityKind::Police),
        Tool::FindNearest(AmenityKind::FireStation),
        Tool::FindNearest(AmenityKind::PublicOffice),
        Tool::Validate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::FindNearest(AmenityKind::Hospital) => "find_nearest_hospital",
            Tool::FindNearest(AmenityKind::Police) => "find_nearest_police",
            Tool::FindNearest(AmenityKind::FireStation) => "find_nearest_fire_station",
            Tool::FindNearest(AmenityKind::PublicOffice) => "find_nearest_public_office",
            Tool::Validate => "validate",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::FindNearest(AmenityKind::Hospital) => {
                "Find the nearest hospitals within the given radius in km."
            }
            Tool::FindNearest(AmenityKind::Police) => {
                "Find the nearest police stations within the given radius in km."
            }
            Tool::FindNearest(AmenityKind::FireStation) => {
                "Find the nearest fire stations within the given radius in km."
            }
            Tool::FindNearest(AmenityKind::PublicOffice) => {
                "Find the nearest public offices (town halls) within the given radius in km."
            }
            Tool::Validate => {
                "Validate the given bearer token and return the owner's phone number."
            }
        }
    }

    fn parameters(self) -> &'static [&'static str] {
        match self {
            Tool::FindNearest(_) => &["latitude", "longitude", "radius_km"],
            Tool::Validate => &["bearer_token"],
        }
    }
}

impl FromStr for Tool {
    type Err = NearMeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| NearMeError::ToolNotFound(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [&'static str],
}

pub fn list_tools() -> Vec<ToolDescriptor> {
    Tool::ALL
        .into_iter()
        .map(|tool| ToolDescriptor {
            name: tool.name(),
            description: tool.description(),
            parameters: tool.parameters(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolArgs {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub bearer_token: Option<String>,
}

/// The host-side tool set: every search tool funnels into the one engine.
pub struct Toolbox {
    engine: AmenitySearchEngine,
    default_radius_km: f64,
    bearer_token: String,
    owner_phone_number: String,
}

impl Toolbox {
    pub fn new(engine: AmenitySearchEngine, config: &Config) -> Self {
        Toolbox {
            engine,
            default_radius_km: config.default_radius_km,
            bearer_token: config.bearer_token.clone(),
            owner_phone_number: config.owner_phone_number.clone(),
        }
    }

    pub async fn call(&self, name: &str, args: ToolArgs) -> Result<Value, NearMeError> {
        let tool: Tool = name.parse()?;
        trace!("Received {} call.", tool.name());
        match tool {
            Tool::FindNearest(kind) => {
                let results = self.find_nearest(kind, &args).await?;
                Ok(json!(results))
            }
            Tool::Validate => self.validate(args.bearer_token.as_deref()).map(|phone| json!(phone)),
        }
    }

    async fn find_nearest(
        &self,
        kind: AmenityKind,
        args: &ToolArgs,
    ) -> Result<Vec<AmenityResult>, NearMeError> {
        let latitude = args.latitude.ok_or(NearMeError::MissingArgument("latitude"))?;
        let longitude = args
            .longitude
            .ok_or(NearMeError::MissingArgument("longitude"))?;
        let origin = GeoPoint::new(latitude, longitude)?;

        let radius_km = args.radius_km.unwrap_or(self.default_radius_km);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(NearMeError::InvalidRadius(radius_km));
        }

        let results = self
            .engine
            .search(origin, radius_km, &kind.to_string())
            .await?;
        debug!(
            "{} result(s) for {} within {} km.",
            results.len(),
            kind,
            radius_km
        );
        Ok(results)
    }

    fn validate(&self, bearer_token: Option<&str>) -> Result<&str, NearMeError> {
        match bearer_token {
            Some(token) if token == self.bearer_token => Ok(&self.owner_phone_number),
            _ => {
                warn!("Rejected bearer token.");
                Err(NearMeError::InvalidBearerToken)
            }
        }
    }
}
