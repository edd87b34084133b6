/// Coordinate definitions for addressing corpus pages
///
/// A coordinate names one page of the corpus. Ordering is lexicographic on
/// (volume, section, page), which is also the order pages must be read in.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when building or parsing a coordinate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("{field} must be >= 1, got {value}")]
    NotPositive { field: &'static str, value: u32 },

    #[error("{field} must be <= {max}, got {value}", max = Coordinate::MAX_FIELD)]
    TooLarge { field: &'static str, value: u32 },

    #[error("expected VOLUME,SECTION,PAGE, got '{0}'")]
    Malformed(String),
}

/// One addressable page: (volume, section, page), every field in
/// `1..=MAX_FIELD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub volume: u32,
    pub section: u32,
    pub page: u32,
}

impl Coordinate {
    /// First page of the corpus; also the default when no checkpoint exists
    pub const START: Coordinate = Coordinate {
        volume: 1,
        section: 1,
        page: 1,
    };

    /// Largest accepted value for any field
    pub const MAX_FIELD: u32 = 1_000_000;

    /// Creates a coordinate, rejecting zero or values above `MAX_FIELD`
    pub fn new(volume: u32, section: u32, page: u32) -> Result<Self, CoordinateError> {
        for (field, value) in [("volume", volume), ("section", section), ("page", page)] {
            if value == 0 {
                return Err(CoordinateError::NotPositive { field, value });
            }
            if value > Self::MAX_FIELD {
                return Err(CoordinateError::TooLarge { field, value });
            }
        }
        Ok(Self {
            volume,
            section,
            page,
        })
    }

    /// Returns an error if any field is out of range (e.g. a hand-edited checkpoint)
    pub fn validate(&self) -> Result<(), CoordinateError> {
        Self::new(self.volume, self.section, self.page).map(|_| ())
    }

    /// Next page in the same section
    pub fn next_page(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self
        }
    }

    /// First page of the next section in the same volume
    pub fn next_section(self) -> Self {
        Self {
            volume: self.volume,
            section: self.section.saturating_add(1),
            page: 1,
        }
    }

    /// First page of the first section of the next volume
    pub fn next_volume(self) -> Self {
        Self {
            volume: self.volume.saturating_add(1),
            section: 1,
            page: 1,
        }
    }

    pub fn is_start(&self) -> bool {
        *self == Self::START
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{} S{} P{}", self.volume, self.section, self.page)
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    /// Parses `V,S,P` (also accepts `V/S/P`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split([',', '/']).map(str::trim).collect();
        if parts.len() != 3 {
            return Err(CoordinateError::Malformed(s.to_string()));
        }

        let mut fields = [0u32; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| CoordinateError::Malformed(s.to_string()))?;
        }

        Self::new(fields[0], fields[1], fields[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(v: u32, s: u32, p: u32) -> Coordinate {
        Coordinate::new(v, s, p).unwrap()
    }

    #[test]
    fn test_lexicographic_order() {
        assert!(c(1, 1, 9) < c(1, 2, 1));
        assert!(c(1, 9, 9) < c(2, 1, 1));
        assert!(c(2, 3, 4) < c(2, 3, 5));

        let mut coords = vec![c(2, 1, 1), c(1, 2, 1), c(1, 1, 10), c(1, 1, 2)];
        coords.sort();
        assert_eq!(coords, vec![c(1, 1, 2), c(1, 1, 10), c(1, 2, 1), c(2, 1, 1)]);
    }

    #[test]
    fn test_rejects_zero_fields() {
        assert!(Coordinate::new(0, 1, 1).is_err());
        assert!(Coordinate::new(1, 0, 1).is_err());
        assert_eq!(
            Coordinate::new(1, 1, 0),
            Err(CoordinateError::NotPositive {
                field: "page",
                value: 0
            })
        );
    }

    #[test]
    fn test_rejects_oversized_fields() {
        assert!(Coordinate::new(Coordinate::MAX_FIELD, 1, 1).is_ok());
        assert_eq!(
            Coordinate::new(1, Coordinate::MAX_FIELD + 1, 1),
            Err(CoordinateError::TooLarge {
                field: "section",
                value: Coordinate::MAX_FIELD + 1
            })
        );
        assert!("4294967295,1,1".parse::<Coordinate>().is_err());
        assert!("1,1,4294967295".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_advances_never_overflow() {
        let edge = Coordinate {
            volume: u32::MAX,
            section: u32::MAX,
            page: u32::MAX,
        };
        assert_eq!(edge.next_page().page, u32::MAX);
        assert_eq!(edge.next_section().section, u32::MAX);
        assert_eq!(edge.next_volume().volume, u32::MAX);
    }

    #[test]
    fn test_advances() {
        assert_eq!(c(3, 2, 4).next_page(), c(3, 2, 5));
        assert_eq!(c(3, 2, 4).next_section(), c(3, 3, 1));
        assert_eq!(c(3, 2, 4).next_volume(), c(4, 1, 1));
    }

    #[test]
    fn test_parse() {
        assert_eq!("3,2,4".parse::<Coordinate>().unwrap(), c(3, 2, 4));
        assert_eq!("3/2/4".parse::<Coordinate>().unwrap(), c(3, 2, 4));
        assert_eq!(" 1, 1 ,9".parse::<Coordinate>().unwrap(), c(1, 1, 9));

        assert!("1,2".parse::<Coordinate>().is_err());
        assert!("a,b,c".parse::<Coordinate>().is_err());
        assert!("0,1,1".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(c(2, 3, 1).to_string(), "V2 S3 P1");
    }
}
