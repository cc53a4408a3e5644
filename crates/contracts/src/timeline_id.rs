//! TimelineId - kind + index identifier used in logs and delay keys

use std::fmt;
use std::str::FromStr;

use crate::{ContractError, TimelineKind};

const FRAME_DELAY_PREFIX: &str = "frameDelay_";
const MATRIX_DELAY_PREFIX: &str = "matrixDelay_";

/// Identifies one timeline within its kind's index space.
///
/// Displays as `frame3` / `matrix0`, which is how timelines are named in logs.
///
/// # Examples
/// ```
/// use contracts::{TimelineId, TimelineKind};
///
/// let id = TimelineId::frame(3);
/// assert_eq!(id.to_string(), "frame3");
///
/// let parsed = TimelineId::from_delay_key("matrixDelay_1").unwrap();
/// assert_eq!(parsed, TimelineId::new(TimelineKind::Matrix, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineId {
    pub kind: TimelineKind,
    pub index: usize,
}

impl TimelineId {
    #[inline]
    pub fn new(kind: TimelineKind, index: usize) -> Self {
        Self { kind, index }
    }

    #[inline]
    pub fn frame(index: usize) -> Self {
        Self::new(TimelineKind::Frame, index)
    }

    #[inline]
    pub fn matrix(index: usize) -> Self {
        Self::new(TimelineKind::Matrix, index)
    }

    /// Parse a delay parameter key (`frameDelay_<i>` or `matrixDelay_<i>`).
    pub fn from_delay_key(key: &str) -> Result<Self, ContractError> {
        let (kind, suffix) = if let Some(rest) = key.strip_prefix(FRAME_DELAY_PREFIX) {
            (TimelineKind::Frame, rest)
        } else if let Some(rest) = key.strip_prefix(MATRIX_DELAY_PREFIX) {
            (TimelineKind::Matrix, rest)
        } else {
            return Err(ContractError::UnknownKey {
                key: key.to_string(),
            });
        };

        let index = usize::from_str(suffix).map_err(|_| ContractError::UnknownKey {
            key: key.to_string(),
        })?;

        Ok(Self::new(kind, index))
    }

    /// Delay key for this timeline, inverse of [`TimelineId::from_delay_key`].
    pub fn delay_key(&self) -> String {
        match self.kind {
            TimelineKind::Frame => format!("{FRAME_DELAY_PREFIX}{}", self.index),
            TimelineKind::Matrix => format!("{MATRIX_DELAY_PREFIX}{}", self.index),
        }
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TimelineId::frame(0).to_string(), "frame0");
        assert_eq!(TimelineId::matrix(12).to_string(), "matrix12");
    }

    #[test]
    fn test_parse_delay_keys() {
        assert_eq!(
            TimelineId::from_delay_key("frameDelay_2").unwrap(),
            TimelineId::frame(2)
        );
        assert_eq!(
            TimelineId::from_delay_key("matrixDelay_0").unwrap(),
            TimelineId::matrix(0)
        );
        assert_eq!(TimelineId::matrix(4).delay_key(), "matrixDelay_4");
    }

    #[test]
    fn test_reject_unknown_keys() {
        assert!(TimelineId::from_delay_key("tolerance").is_err());
        assert!(TimelineId::from_delay_key("frameDelay_").is_err());
        assert!(TimelineId::from_delay_key("frameDelay_x").is_err());
        assert!(TimelineId::from_delay_key("frameDelay_-1").is_err());
    }
}
