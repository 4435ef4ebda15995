// Postbox record model.
// Defines the persisted postbox entity, royal cypher enum, type-label
// parsing, and installation-age estimation.

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lookup::types::RawPostbox;

/// Royal cypher cast into the postbox, indicating the reigning monarch at
/// installation time. Purely descriptive and user-editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Monarch {
    #[default]
    #[serde(rename = "NONE")]
    Unmarked,
    Victoria,
    Edward7,
    George5,
    Edward8,
    George6,
    Elizabeth2,
    /// Scottish boxes installed after the Pillar Box War carry the Crown of
    /// Scotland instead of a royal cypher.
    ScottishCrown,
    Charles3,
}

impl Monarch {
    pub fn display_name(&self) -> &'static str {
        match self {
            Monarch::Unmarked => "Unmarked",
            Monarch::Victoria => "Victoria (VR)",
            Monarch::Edward7 => "Edward 7th (E VII R)",
            Monarch::George5 => "George 5th (GR)",
            Monarch::Edward8 => "Edward 8th (E VIII R)",
            Monarch::George6 => "George 6th (G VI R)",
            Monarch::Elizabeth2 => "Elizabeth 2nd (E II R)",
            Monarch::ScottishCrown => "Crown Of Scotland (No Royal Cypher)",
            Monarch::Charles3 => "Charles 3rd (C III R)",
        }
    }

    /// Years during which boxes bearing this cypher were installed. The upper
    /// bound is open for cyphers still being installed today. `None` for
    /// unmarked boxes.
    pub fn reign(&self) -> Option<(i32, Option<i32>)> {
        match self {
            Monarch::Unmarked => None,
            // first standardised pillar boxes bearing Victoria's cypher
            // appeared around 1866, well after her accession
            Monarch::Victoria => Some((1866, Some(1901))),
            Monarch::Edward7 => Some((1901, Some(1910))),
            Monarch::George5 => Some((1910, Some(1936))),
            Monarch::Edward8 => Some((1936, Some(1936))),
            Monarch::George6 => Some((1936, Some(1952))),
            Monarch::Elizabeth2 => Some((1952, Some(2024))),
            Monarch::ScottishCrown => Some((1954, None)),
            // Elizabeth 2nd died in 2022 but the first Charles 3rd box was
            // only unveiled in July 2024
            Monarch::Charles3 => Some((2024, None)),
        }
    }
}

impl std::fmt::Display for Monarch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Physical postbox design, parsed from the free-text type label the lookup
/// source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    WallBoxB,
    WallBoxC,
    /// C-type double: two chambers in one unit.
    DoubleC,
    LampBox,
    BantamN,
    MType,
    Parcel,
    Pillar,
    KTypePillar,
    Indoor,
}

impl BoxKind {
    /// Parse a type label. Match order mirrors how labels overlap in the
    /// wild ("wall box c type" must not be taken for a C-type double).
    pub fn parse(label: Option<&str>) -> Option<BoxKind> {
        let label = label.unwrap_or("").to_lowercase();

        if label.contains("wall box") {
            Some(if label.contains("c type") {
                BoxKind::WallBoxC
            } else {
                BoxKind::WallBoxB
            })
        } else if label.contains("type c") || label.contains("c type") {
            Some(BoxKind::DoubleC)
        } else if label.contains("lamp pedastal") || label.contains("l type") {
            Some(BoxKind::LampBox)
        } else if label.contains("bantam n") {
            Some(BoxKind::BantamN)
        } else if label.contains("m type") {
            Some(BoxKind::MType)
        } else if label.contains("parcel") {
            Some(BoxKind::Parcel)
        } else if label.contains("pillar") {
            Some(if label.contains("k type") {
                BoxKind::KTypePillar
            } else {
                BoxKind::Pillar
            })
        } else if label.contains("indoor") {
            Some(BoxKind::Indoor)
        } else {
            None
        }
    }

    /// Human-facing category name.
    pub fn category(&self) -> &'static str {
        match self {
            BoxKind::WallBoxB | BoxKind::WallBoxC => "Wall Box",
            BoxKind::DoubleC => "Double",
            BoxKind::LampBox | BoxKind::BantamN | BoxKind::MType => "Lamppost Box",
            BoxKind::Parcel => "Parcel",
            BoxKind::Pillar | BoxKind::KTypePillar => "Pillar",
            BoxKind::Indoor => "Indoor",
        }
    }

    /// Year this design was first installed, where documented.
    fn introduced_year(&self) -> Option<i32> {
        match self {
            // double wide introduced in 1899
            BoxKind::DoubleC => Some(1899),
            BoxKind::BantamN => Some(1999),
            // lamp box design dates to 1896
            BoxKind::LampBox | BoxKind::MType => Some(1896),
            // wall boxes introduced in 1857
            BoxKind::WallBoxB | BoxKind::WallBoxC => Some(1857),
            BoxKind::Parcel => Some(2019),
            _ => None,
        }
    }
}

/// Coordinates as reported by the lookup source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub latitude: f32,
    pub longitude: f32,
}

impl Coords {
    pub fn position(&self) -> crate::geo::Position {
        crate::geo::Position::new(self.latitude as f64, self.longitude as f64)
    }
}

/// A postbox the user has registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Postbox {
    /// `"<postcode> <reference>"` for standard boxes, a generated UUID for
    /// inactive ones. Unique within a save store; used as the map key.
    pub id: String,
    pub coords: Coords,
    pub monarch: Monarch,
    /// Local ISO-8601 timestamp, no zone.
    pub date_registered: String,
    /// Raw name from the lookup source, or user-entered for inactive boxes.
    pub name: String,
    /// Free-text type label from the lookup source.
    #[serde(rename = "type")]
    pub box_type: Option<String>,
    /// Whether the user's physical presence near the box has been confirmed.
    /// Boxes added from the map alone start unverified.
    #[serde(default = "default_true")]
    pub verified: bool,
    /// Whether the box is no longer in service.
    #[serde(default)]
    pub inactive: bool,
    /// Id of the other half, if this box is half of a double.
    #[serde(default, rename = "double")]
    pub paired_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Postbox {
    /// Build a record from a raw lookup entry at registration time.
    ///
    /// Inactive boxes have no canonical identifier in the lookup source, so
    /// they get a freshly generated UUID instead of the postcode+reference
    /// form. A merged double keeps its name without the L/R marker and holds
    /// the other half's id.
    pub fn from_raw(raw: &RawPostbox, monarch: Monarch, verified: bool) -> Self {
        let inactive = raw.entry_type.eq_ignore_ascii_case("inactive");

        let mut name = raw.office_details.name.clone();
        let mut paired_id = None;
        if let Some(other) = &raw.double {
            name = strip_pair_marker(&name);
            paired_id = Some(format!(
                "{} {}",
                other.office_details.postcode, other.office_details.address1
            ));
        }

        let id = if inactive {
            Uuid::new_v4().to_string()
        } else {
            format!(
                "{} {}",
                raw.office_details.postcode, raw.office_details.address1
            )
        };

        Self {
            id,
            coords: Coords {
                latitude: raw.location_details.latitude,
                longitude: raw.location_details.longitude,
            },
            monarch,
            date_registered: Local::now()
                .naive_local()
                .format("%Y-%m-%dT%H:%M:%S%.3f")
                .to_string(),
            name,
            box_type: Some(raw.office_details.address3.clone()),
            verified,
            inactive,
            paired_id,
        }
    }

    /// Estimate a plausible installation year range from the cypher and the
    /// type label. `None` if neither source has data.
    pub fn age_estimate(&self) -> Option<(i32, Option<i32>)> {
        estimate_age(self.monarch, self.box_type.as_deref())
    }

    /// Name normalized for display: title-cased, with the L/R marker
    /// stripped when this box is half of a double.
    pub fn display_name(&self) -> String {
        let name = if self.paired_id.is_some() {
            strip_pair_marker(&self.name)
        } else {
            self.name.clone()
        };
        human_readable_name(&name)
    }
}

/// Estimate an installation year range from a cypher and a type label.
///
/// Designs with a documented lifespan fully determine the range. Otherwise
/// the type contributes a lower bound and the monarch a range; if the type's
/// lower bound falls after the reign ended, the two disagree and the monarch
/// range alone is trusted (a mis-identified cypher is the likelier mistake,
/// and it is the number the user expects).
pub fn estimate_age(monarch: Monarch, box_type: Option<&str>) -> Option<(i32, Option<i32>)> {
    let kind = BoxKind::parse(box_type);

    // k type pillar introduced in 1980 and withdrawn after 2001
    if kind == Some(BoxKind::KTypePillar) {
        return Some((1980, Some(2001)));
    }

    let type_lower = kind.and_then(|k| k.introduced_year());
    let monarch_bounds = monarch.reign();

    match (type_lower, monarch_bounds) {
        (None, bounds) => bounds,
        (Some(lower), None) => Some((lower, None)),
        (Some(lower), Some((reign_start, reign_end))) => {
            if let Some(end) = reign_end {
                if lower > end {
                    return Some((reign_start, reign_end));
                }
            }
            Some((lower.max(reign_start), reign_end))
        }
    }
}

/// Remove the ` (L)` / ` (R)` marker from a double postbox name.
pub fn strip_pair_marker(name: &str) -> String {
    name.replace(" (L)", "").replace(" (R)", "")
}

/// Title-case a raw postbox name ("HIGH STREET (L)" -> "High Street (L)").
pub fn human_readable_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_boundary = true;
    for c in name.to_lowercase().chars() {
        if at_boundary && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = !c.is_alphanumeric();
    }
    out
}
