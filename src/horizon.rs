//! Forecast horizon selector.

use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// One entry of the horizon drop-down: 30, 60, ..., 360.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonChoice(u32);

impl HorizonChoice {
    pub const OPTIONS: [u32; 12] = [30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 330, 360];

    /// Days actually requested per selected unit.
    pub const DAYS_PER_UNIT: u32 = 30;

    pub fn new(selected: u32) -> Result<Self, PipelineError> {
        if Self::OPTIONS.contains(&selected) {
            Ok(Self(selected))
        } else {
            Err(PipelineError::Input(format!(
                "{selected} is not one of the offered horizons"
            )))
        }
    }

    /// The value shown in the selector.
    pub fn selected(self) -> u32 {
        self.0
    }

    /// Days handed to the forecaster.
    ///
    /// The selected value is multiplied by 30 once more, so picking 30
    /// forecasts 900 days.
    pub fn effective_days(self) -> u32 {
        self.0 * Self::DAYS_PER_UNIT
    }

    pub fn all() -> impl Iterator<Item = HorizonChoice> {
        Self::OPTIONS.into_iter().map(HorizonChoice)
    }
}

impl Default for HorizonChoice {
    fn default() -> Self {
        Self(Self::OPTIONS[0])
    }
}

impl FromStr for HorizonChoice {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selected = s
            .trim()
            .parse::<u32>()
            .map_err(|_| PipelineError::Input(format!("{s:?} is not a horizon")))?;
        Self::new(selected)
    }
}

impl fmt::Display for HorizonChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_twelve_multiples_of_thirty() {
        let offered: Vec<u32> = HorizonChoice::all().map(HorizonChoice::selected).collect();
        assert_eq!(offered, (30..=360).step_by(30).collect::<Vec<_>>());
    }

    #[test]
    fn effective_days_is_selection_times_thirty() {
        for choice in HorizonChoice::all() {
            assert_eq!(choice.effective_days(), choice.selected() * 30);
        }
        assert_eq!(HorizonChoice::new(30).unwrap().effective_days(), 900);
        assert_eq!(HorizonChoice::new(360).unwrap().effective_days(), 10_800);
    }

    #[test]
    fn rejects_values_outside_the_selector() {
        assert!(HorizonChoice::new(0).is_err());
        assert!(HorizonChoice::new(45).is_err());
        assert!("abc".parse::<HorizonChoice>().is_err());
        assert_eq!(" 90 ".parse::<HorizonChoice>().unwrap().selected(), 90);
    }
}
