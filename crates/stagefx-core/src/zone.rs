//! Logical fixture zones
//!
//! A zone is only a name. Which physical fixtures belong to it is decided by
//! the fixture translation layer downstream, and zones may overlap freely
//! (a mover can sit in both `movers_left` and `all-movers`).

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

const STANDARD_ZONES: &[Zone] = &[
    Zone::FRONT,
    Zone::PARS,
    Zone::BACK,
    Zone::MOVERS_LEFT,
    Zone::MOVERS_RIGHT,
    Zone::ALL_MOVERS,
    Zone::ALL,
];

/// Named group of fixtures addressed by effects
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(Cow<'static, str>);

impl Zone {
    /// Front wash
    pub const FRONT: Zone = Zone(Cow::Borrowed("front"));
    /// Back wash
    pub const BACK: Zone = Zone(Cow::Borrowed("back"));
    /// PAR cans
    pub const PARS: Zone = Zone(Cow::Borrowed("pars"));
    /// Stage-left moving heads
    pub const MOVERS_LEFT: Zone = Zone(Cow::Borrowed("movers_left"));
    /// Stage-right moving heads
    pub const MOVERS_RIGHT: Zone = Zone(Cow::Borrowed("movers_right"));
    /// Every moving head
    pub const ALL_MOVERS: Zone = Zone(Cow::Borrowed("all-movers"));
    /// Whole rig
    pub const ALL: Zone = Zone(Cow::Borrowed("all"));

    /// Create a zone from any name
    pub fn new(name: impl Into<String>) -> Self {
        Zone(Cow::Owned(name.into()))
    }

    /// Zone name
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Well-known zones, in stage order
    pub fn standard() -> &'static [Zone] {
        STANDARD_ZONES
    }

    /// True for zones made of moving heads
    pub fn is_movers(&self) -> bool {
        let name = self.name();
        name.contains("movers")
    }

    /// Fraction of a cycle this zone lags behind `front` in spatial chases
    pub fn phase_offset(&self) -> f32 {
        let slot = match self.name() {
            "front" => 0.0,
            "pars" => 1.0,
            "back" => 2.0,
            name if name.contains("movers") => 3.0,
            _ => 0.0,
        };
        slot / 4.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Zone {
    fn from(name: &str) -> Self {
        Zone::standard()
            .iter()
            .find(|z| z.name() == name)
            .cloned()
            .unwrap_or_else(|| Zone::new(name))
    }
}

impl From<String> for Zone {
    fn from(name: String) -> Self {
        Zone(Cow::Owned(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_and_borrowed_compare_equal() {
        assert_eq!(Zone::new("front"), Zone::FRONT);
        assert_eq!(Zone::from("movers_left"), Zone::MOVERS_LEFT);
    }

    #[test]
    fn test_phase_offsets() {
        assert_eq!(Zone::FRONT.phase_offset(), 0.0);
        assert_eq!(Zone::PARS.phase_offset(), 0.25);
        assert_eq!(Zone::BACK.phase_offset(), 0.5);
        assert_eq!(Zone::MOVERS_RIGHT.phase_offset(), 0.75);
        assert_eq!(Zone::ALL.phase_offset(), 0.0);
    }

    #[test]
    fn test_serde_is_a_plain_string() {
        let json = serde_json::to_string(&Zone::BACK).unwrap();
        assert_eq!(json, "\"back\"");
        let zone: Zone = serde_json::from_str("\"side\"").unwrap();
        assert_eq!(zone.name(), "side");
    }
}
