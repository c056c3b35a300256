//! Restaurant branch lookup for ship-to blocks.

use crate::models::invoice::ShipTo;

/// Branches known by default.
pub const DEFAULT_LOCATIONS: [&str; 7] = [
    "PLAYA VISTA",
    "SAWTELLE",
    "SANTA MONICA",
    "MANHATTAN BEACH",
    "PASADENA",
    "LONG BEACH",
    "TOPANGA VILLAGE",
];

/// Matches ship-to text against a fixed list of branch names.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    /// Canonical names: upper case, single spaces.
    locations: Vec<String>,
}

impl LocationResolver {
    /// Create a resolver over the given branch names.
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let locations = locations
            .into_iter()
            .map(|l| canonicalize(l.as_ref()))
            .filter(|l| !l.is_empty())
            .collect();
        Self { locations }
    }

    /// Canonical branch names in match order.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// First known branch contained in `text`.
    pub fn match_text(&self, text: &str) -> Option<&str> {
        let haystack = canonicalize(text);
        self.locations
            .iter()
            .find(|location| haystack.contains(location.as_str()))
            .map(String::as_str)
    }

    /// Resolve the branch for a ship-to block.
    ///
    /// The restaurant name is searched first, then the address, then the
    /// location the model reported. Returns `None` when nothing matches.
    pub fn resolve(&self, ship_to: &ShipTo) -> Option<String> {
        [&ship_to.name, &ship_to.address, &ship_to.location]
            .into_iter()
            .flatten()
            .find_map(|text| self.match_text(text))
            .map(str::to_string)
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATIONS)
    }
}

fn canonicalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship_to(name: Option<&str>, location: Option<&str>, address: Option<&str>) -> ShipTo {
        ShipTo {
            name: name.map(String::from),
            location: location.map(String::from),
            address: address.map(String::from),
        }
    }

    #[test]
    fn test_match_in_name() {
        let resolver = LocationResolver::default();
        let target = ship_to(Some("Dan Modern Chinese  Santa   Monica"), None, None);

        assert_eq!(resolver.resolve(&target).as_deref(), Some("SANTA MONICA"));
    }

    #[test]
    fn test_address_before_model_value() {
        let resolver = LocationResolver::default();
        let target = ship_to(
            Some("DAN MODERN CHINESE #4"),
            Some("Sawtelle"),
            Some("1450 Manhattan Beach Blvd, Manhattan Beach, CA"),
        );

        assert_eq!(resolver.resolve(&target).as_deref(), Some("MANHATTAN BEACH"));
    }

    #[test]
    fn test_model_value_canonicalized() {
        let resolver = LocationResolver::default();
        let target = ship_to(Some("DAN MODERN CHINESE #2"), Some("topanga village"), None);

        assert_eq!(resolver.resolve(&target).as_deref(), Some("TOPANGA VILLAGE"));
    }

    #[test]
    fn test_unknown_location_is_none() {
        let resolver = LocationResolver::default();
        let target = ship_to(Some("DAN MODERN CHINESE"), Some("Downtown"), Some("Los Angeles"));

        assert_eq!(resolver.resolve(&target), None);
    }

    #[test]
    fn test_custom_list() {
        let resolver = LocationResolver::new(["koreatown", " "]);

        assert_eq!(resolver.locations(), ["KOREATOWN".to_string()]);
        assert_eq!(resolver.match_text("3rd St, Koreatown"), Some("KOREATOWN"));
    }
}
