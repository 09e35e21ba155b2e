//! Address model produced by reverse geocoding

use serde::{Deserialize, Serialize};

/// Structured postal address. Every field is optional because geocoders
/// return whatever subset they know.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// State, province or metropolitan city
    pub admin_area: Option<String>,
    /// City or district
    pub locality: Option<String>,
    /// Neighbourhood or borough below the locality
    pub sub_locality: Option<String>,
    /// Street or block name
    pub thoroughfare: Option<String>,
    /// House number on the thoroughfare
    pub sub_thoroughfare: Option<String>,
    /// Country name in the requested language
    pub country_name: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Address {
    /// Headline label: thoroughfare first, then progressively coarser areas
    #[must_use]
    pub fn title(&self) -> Option<String> {
        if let Some(road) = present(&self.thoroughfare) {
            return Some(match present(&self.sub_thoroughfare) {
                Some(number) => format!("{road} {number}"),
                None => road.to_string(),
            });
        }

        [
            &self.locality,
            &self.sub_locality,
            &self.admin_area,
            &self.country_name,
        ]
        .into_iter()
        .find_map(present)
        .map(str::to_string)
    }

    /// Secondary label built from admin area, locality and sub-locality,
    /// skipping whatever the title already shows
    #[must_use]
    pub fn subtitle(&self) -> Option<String> {
        let title = self.title();
        let title = title.as_deref();

        let parts: Vec<&str> = [&self.admin_area, &self.locality, &self.sub_locality]
            .into_iter()
            .filter_map(present)
            .filter(|part| Some(*part) != title)
            .collect();

        if !parts.is_empty() {
            return Some(parts.join(" "));
        }

        present(&self.country_name)
            .filter(|country| Some(*country) != title)
            .map(str::to_string)
    }

    /// Whether the geocoder returned nothing usable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title().is_none() && present(&self.postal_code).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gangnam() -> Address {
        Address {
            admin_area: Some("Seoul".to_string()),
            locality: Some("Gangnam-gu".to_string()),
            sub_locality: Some("Yeoksam-dong".to_string()),
            country_name: Some("South Korea".to_string()),
            ..Address::default()
        }
    }

    #[test]
    fn test_title_falls_back_to_locality() {
        let address = gangnam();
        assert_eq!(address.title().as_deref(), Some("Gangnam-gu"));
        assert_eq!(address.subtitle().as_deref(), Some("Seoul Yeoksam-dong"));
    }

    #[test]
    fn test_title_prefers_thoroughfare_with_number() {
        let address = Address {
            thoroughfare: Some("Teheran-ro".to_string()),
            sub_thoroughfare: Some("152".to_string()),
            ..gangnam()
        };
        assert_eq!(address.title().as_deref(), Some("Teheran-ro 152"));
        assert_eq!(
            address.subtitle().as_deref(),
            Some("Seoul Gangnam-gu Yeoksam-dong")
        );
    }

    #[test]
    fn test_blank_fields_are_ignored() {
        let address = Address {
            thoroughfare: Some("  ".to_string()),
            locality: Some("Busan".to_string()),
            ..Address::default()
        };
        assert_eq!(address.title().as_deref(), Some("Busan"));
        assert_eq!(address.subtitle(), None);
    }

    #[test]
    fn test_country_only() {
        let address = Address {
            country_name: Some("Iceland".to_string()),
            ..Address::default()
        };
        assert_eq!(address.title().as_deref(), Some("Iceland"));
        assert_eq!(address.subtitle(), None);
        assert!(!address.is_empty());
        assert!(Address::default().is_empty());
    }

    #[test]
    fn test_subtitle_uses_country_when_no_areas() {
        let address = Address {
            thoroughfare: Some("Main Street".to_string()),
            country_name: Some("Ireland".to_string()),
            ..Address::default()
        };
        assert_eq!(address.subtitle().as_deref(), Some("Ireland"));
    }
}
