//! Observation enrichment: species group, site function, address and roost number.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use fieldvisit_parser::ObservationRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::locations::{observation_point, RegionBounds};
use crate::timestamps::to_zone;
use crate::types::GeoPoint;

static BAT_SPECIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)vleermuis|vlieger").expect("valid bat pattern"));
static OTHER_SPECIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmuis\b|vos|pad|salamander").expect("valid other species pattern")
});

const BAT_ROOST_BEHAVIOURS: &[&str] = &[
    "Invliegend (algemeen)",
    "uitvliegend (algemeen)",
    "territoriumindicerend",
    "ter plaatse",
    "bezoek aan nestplaats",
];

const BAT_MATING_BEHAVIOURS: &[&str] = &[
    "baltsend",
    "zwermend (algemeen)",
    "baltsend/zingend",
    "parend / copula",
];

const BIRD_NEST_BEHAVIOURS: &[&str] = &[
    "Invliegend (algemeen)",
    "uitvliegend (algemeen)",
    "territoriumindicerend",
    "ter plaatse",
    "bezoek aan nestplaats",
    "parend / copula",
    "baltsend/zingend",
    "baltsend",
    "slaapplaats",
    "nest-indicerend gedrag",
    "roepend",
    "nestbouw",
    "rustend",
];

const FLIGHT_BEHAVIOURS: &[&str] = &[
    "overvliegend",
    "passerend (niet nader omschreven)",
    "overvliegend naar noord",
    "overvliegend naar zuid",
    "overvliegend naar oost",
    "overvliegend naar west",
];

const FORAGING_BEHAVIOURS: &[&str] = &["foeragerend"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpeciesGroup {
    Bats,
    Birds,
    Other,
    Unknown,
}

impl SpeciesGroup {
    pub fn label(&self) -> &'static str {
        match self {
            SpeciesGroup::Bats => "Vleermuizen",
            SpeciesGroup::Birds => "Vogels",
            SpeciesGroup::Other => "Overig",
            SpeciesGroup::Unknown => "onbekend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SiteFunction {
    SummerRoost,
    MaternityRoost,
    MatingRoost,
    NestLocation,
    FlightPath,
    ForagingArea,
}

impl SiteFunction {
    pub fn label(&self) -> &'static str {
        match self {
            SiteFunction::SummerRoost => "zomerverblijfplaats",
            SiteFunction::MaternityRoost => "kraamverblijfplaats",
            SiteFunction::MatingRoost => "paarverblijfplaats",
            SiteFunction::NestLocation => "nestlocatie",
            SiteFunction::FlightPath => "vliegroute",
            SiteFunction::ForagingArea => "foerageergebied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedObservation {
    pub record: ObservationRecord,
    pub project_name: Option<String>,
    pub point: Option<GeoPoint>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub group: SpeciesGroup,
    pub count: f64,
    pub function: Option<SiteFunction>,
    /// Full reverse-geocoded address, when looked up.
    pub address: Option<String>,
    pub street_address: Option<String>,
    pub place: Option<String>,
    pub roost_number: Option<u32>,
}

pub fn assign_group(species: Option<&str>) -> SpeciesGroup {
    let species = species.map(str::trim).unwrap_or("");
    if species.is_empty() {
        SpeciesGroup::Unknown
    } else if BAT_SPECIES.is_match(species) {
        SpeciesGroup::Bats
    } else if OTHER_SPECIES.is_match(species) {
        SpeciesGroup::Other
    } else {
        SpeciesGroup::Birds
    }
}

/// Site function from group, behaviour and count. Later rules override earlier ones.
pub fn assign_function(group: SpeciesGroup, behaviour: Option<&str>, count: f64) -> Option<SiteFunction> {
    let behaviour = behaviour?.trim();
    let is = |set: &[&str]| set.contains(&behaviour);
    let mut function = None;

    if group == SpeciesGroup::Bats && is(BAT_ROOST_BEHAVIOURS) {
        function = Some(if count > 9.0 {
            SiteFunction::MaternityRoost
        } else {
            SiteFunction::SummerRoost
        });
    }
    if group == SpeciesGroup::Bats && is(BAT_MATING_BEHAVIOURS) {
        function = Some(SiteFunction::MatingRoost);
    }
    if group == SpeciesGroup::Birds && is(BIRD_NEST_BEHAVIOURS) {
        function = Some(SiteFunction::NestLocation);
    }
    if is(FLIGHT_BEHAVIOURS) {
        function = Some(SiteFunction::FlightPath);
    }
    if is(FORAGING_BEHAVIOURS) {
        function = Some(SiteFunction::ForagingArea);
    }
    function
}

/// Splits a Nominatim display name (`nr, street, ..., place, municipality, province,
/// postcode, country`) into `("street nr", place)`.
pub fn parse_address(address: Option<&str>) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = address
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return (None, None);
    }

    let street_address = match (parts.first(), parts.get(1)) {
        (Some(nr), Some(street)) => Some(format!("{street} {nr}")),
        _ => None,
    };
    let place = if parts.len() >= 5 {
        parts[parts.len() - 5]
    } else {
        parts[parts.len() - 1]
    };
    (street_address, Some(place.to_string()))
}

pub fn enrich_observations(
    records: &[ObservationRecord],
    project_names: &HashMap<String, String>,
    region: &RegionBounds,
    tz: Tz,
) -> Vec<EnrichedObservation> {
    let enriched: Vec<EnrichedObservation> = records
        .iter()
        .map(|record| {
            let seen_at = record.seen_at.and_then(|ts| to_zone(ts, tz));
            let group = assign_group(record.species.as_deref());
            let count = record.count.unwrap_or(1.0);
            let project_name = record.project_name.clone().or_else(|| {
                record
                    .project_id
                    .as_ref()
                    .and_then(|id| project_names.get(id).cloned())
            });
            EnrichedObservation {
                record: record.clone(),
                project_name,
                point: observation_point(record, region),
                date: seen_at.map(|dt| dt.date_naive()),
                time: seen_at.map(|dt| dt.time()),
                group,
                count,
                function: assign_function(group, record.behaviour.as_deref(), count),
                address: None,
                street_address: None,
                place: None,
                roost_number: None,
            }
        })
        .collect();

    info!(
        observations = enriched.len(),
        located = enriched.iter().filter(|o| o.point.is_some()).count(),
        with_function = enriched.iter().filter(|o| o.function.is_some()).count(),
        "observations enriched"
    );
    enriched
}

/// Points worth reverse geocoding: located observations whose behaviour is in `behaviours`.
pub fn geocode_targets(observations: &[EnrichedObservation], behaviours: &[String]) -> Vec<GeoPoint> {
    observations
        .iter()
        .filter(|o| {
            o.record
                .behaviour
                .as_deref()
                .is_some_and(|b| behaviours.iter().any(|wanted| wanted == b.trim()))
        })
        .filter_map(|o| o.point)
        .collect()
}

/// Attaches looked-up addresses (keyed by [`GeoPoint::cache_key`]) and numbers the roosts.
pub fn apply_addresses(
    observations: &mut [EnrichedObservation],
    addresses: &HashMap<String, Option<String>>,
    behaviours: &[String],
) {
    for observation in observations.iter_mut() {
        let wanted = observation
            .record
            .behaviour
            .as_deref()
            .is_some_and(|b| behaviours.iter().any(|w| w == b.trim()));
        if !wanted {
            continue;
        }
        let Some(point) = observation.point else {
            continue;
        };
        if let Some(Some(address)) = addresses.get(&point.cache_key()) {
            let (street_address, place) = parse_address(Some(address));
            observation.address = Some(address.clone());
            observation.street_address = street_address;
            observation.place = place;
        }
    }
    assign_roost_numbers(observations);
}

/// Roost number is the 1-based rank of the observation's address among all distinct
/// addresses in sorted order.
pub fn assign_roost_numbers(observations: &mut [EnrichedObservation]) {
    let distinct: BTreeSet<String> = observations
        .iter()
        .filter_map(|o| o.address.clone())
        .collect();
    let ranks: HashMap<String, u32> = distinct
        .into_iter()
        .enumerate()
        .map(|(idx, address)| (address, idx as u32 + 1))
        .collect();
    for observation in observations.iter_mut() {
        observation.roost_number = observation
            .address
            .as_ref()
            .and_then(|address| ranks.get(address).copied());
    }
}
