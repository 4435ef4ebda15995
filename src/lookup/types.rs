// Branch-finder API response types.
// Raw postbox entries as returned by the lookup service, pre-registration.

use serde::{Deserialize, Serialize};

use crate::geo::Position;

/// Office details for a postbox, as reported by the lookup service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeDetails {
    /// Name of the postbox.
    pub name: String,
    /// Postbox reference number. Combined with the postcode this forms the
    /// stable identifier.
    pub address1: String,
    /// Usually the postbox type label.
    pub address3: String,
    /// First half of the postcode.
    pub postcode: String,
}

/// Where a postbox is and how far it was from the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub latitude: f32,
    pub longitude: f32,
    /// Distance from the query point, in miles.
    pub distance: f32,
}

/// A raw postbox entry from the lookup service.
///
/// The service reports each half of a physically doubled box as a separate
/// entry; after merging, one half is nested inside the other via `double`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPostbox {
    /// Location kind tag; only `"PB"` entries are postboxes.
    #[serde(rename = "type")]
    pub entry_type: String,
    pub office_details: OfficeDetails,
    pub location_details: LocationDetails,
    /// The other half of a double postbox. Never returned by the service;
    /// filled in by the merge step.
    #[serde(default)]
    pub double: Option<Box<RawPostbox>>,
}

impl RawPostbox {
    /// Whether this entry looks like one half of a double postbox: a C-type
    /// label (but not a C-type wall box) and an L/R marker in the name.
    pub fn is_double(&self) -> bool {
        let name = self.office_details.name.to_lowercase();
        let label = self.office_details.address3.to_lowercase();
        (label.contains("c type")
            || (label.contains("type c") && !label.contains("wall box")))
            && (name.contains("(l)") || name.contains("(r)"))
    }

    /// Name lowered and with the L/R marker removed, for matching the two
    /// halves of a double against each other.
    pub fn comparison_name(&self) -> String {
        self.office_details
            .name
            .to_lowercase()
            .replace("(l)", "")
            .replace("(r)", "")
    }

    pub fn position(&self) -> Position {
        Position::new(
            self.location_details.latitude as f64,
            self.location_details.longitude as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, label: &str) -> RawPostbox {
        RawPostbox {
            entry_type: "PB".to_string(),
            office_details: OfficeDetails {
                name: name.to_string(),
                address1: "1D".to_string(),
                address3: label.to_string(),
                postcode: "AB1".to_string(),
            },
            location_details: LocationDetails {
                latitude: 51.5,
                longitude: -0.1,
                distance: 0.1,
            },
            double: None,
        }
    }

    #[test]
    fn test_double_detection() {
        assert!(entry("HIGH ST (L)", "C Type").is_double());
        assert!(entry("HIGH ST (R)", "Type C Double").is_double());
        // marker without a C-type label is not a double
        assert!(!entry("HIGH ST (L)", "Pillar Box").is_double());
        // C-type label without a marker is not a double
        assert!(!entry("HIGH ST", "C Type").is_double());
        // wall boxes share the "type c" wording but are single-chamber
        assert!(!entry("HIGH ST (L)", "Wall Box Type C").is_double());
    }

    #[test]
    fn test_comparison_name_strips_marker_case_insensitively() {
        assert_eq!(
            entry("HIGH ST (L)", "C Type").comparison_name(),
            entry("High St (r)", "C Type").comparison_name()
        );
    }

    #[test]
    fn test_deserializes_service_payload() {
        let json = r#"{
            "type": "PB",
            "officeDetails": {
                "name": "STATION ROAD",
                "address1": "52D",
                "address3": "Pillar Box",
                "postcode": "YO1",
                "specialCharacteristics": "",
                "isPriorityPostbox": false
            },
            "locationDetails": {
                "latitude": 53.958,
                "longitude": -1.08,
                "distance": 0.3
            }
        }"#;
        let pb: RawPostbox = serde_json::from_str(json).unwrap();
        assert_eq!(pb.entry_type, "PB");
        assert_eq!(pb.office_details.postcode, "YO1");
        assert_eq!(pb.double, None);
    }
}
