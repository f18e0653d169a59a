//! Digital input polarity.
//!
//! Limit switches are wired to inputs with the internal pull-up enabled,
//! so the raw electrical level depends on the switch contact type:
//!
//! | Logic | Released | Actuated |
//! |-------|----------|----------|
//! | NO    | high     | low      |
//! | NC    | low      | high     |
//!
//! An NC wire break reads high and therefore fails safe as "triggered".

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Digital input logic interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum DiLogic {
    /// Normally Open: contact closes (pulls low) when actuated.
    #[serde(rename = "NO")]
    NO = 0,
    /// Normally Closed: contact opens (floats high) when actuated.
    #[serde(rename = "NC")]
    #[default]
    NC = 1,
}

impl DiLogic {
    /// Whether the switch is actuated for the given raw pin level.
    #[inline]
    pub const fn is_active(self, level_high: bool) -> bool {
        match self {
            Self::NO => !level_high,
            Self::NC => level_high,
        }
    }

    /// Raw pin level that corresponds to the given logical state.
    #[inline]
    pub const fn level_for(self, active: bool) -> bool {
        match self {
            Self::NO => !active,
            Self::NC => active,
        }
    }
}

impl FromStr for DiLogic {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NO" => Ok(Self::NO),
            "NC" => Ok(Self::NC),
            _ => Err(format!("unknown DiLogic: {s:?}, expected \"NO\" or \"NC\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nc_is_active_high() {
        assert!(DiLogic::NC.is_active(true));
        assert!(!DiLogic::NC.is_active(false));
    }

    #[test]
    fn no_is_active_low() {
        assert!(DiLogic::NO.is_active(false));
        assert!(!DiLogic::NO.is_active(true));
    }

    #[test]
    fn level_for_inverts_is_active() {
        for logic in [DiLogic::NO, DiLogic::NC] {
            for active in [false, true] {
                assert_eq!(logic.is_active(logic.level_for(active)), active);
            }
        }
    }

    #[test]
    fn parse_from_str() {
        assert_eq!("NO".parse::<DiLogic>(), Ok(DiLogic::NO));
        assert_eq!("NC".parse::<DiLogic>(), Ok(DiLogic::NC));
        assert!("nc".parse::<DiLogic>().is_err());
    }
}
