use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::ConfigError;

/// Selects the adversarial objective.
///
/// - `WganGp`: Wasserstein loss with a gradient penalty on interpolates.
/// - `Wgan`: plain Wasserstein loss; the critic is left unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LossType {
    #[default]
    #[serde(rename = "wgan-gp")]
    WganGp,
    #[serde(rename = "wgan")]
    Wgan,
}

impl LossType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossType::WganGp => "wgan-gp",
            LossType::Wgan => "wgan",
        }
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgan-gp" | "wgan_gp" => Ok(LossType::WganGp),
            "wgan" => Ok(LossType::Wgan),
            _ => Err(ConfigError::UnknownLossType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names() {
        assert_eq!("wgan-gp".parse::<LossType>().unwrap(), LossType::WganGp);
        assert_eq!("WGAN".parse::<LossType>().unwrap(), LossType::Wgan);
        assert!(matches!("hinge".parse::<LossType>(), Err(ConfigError::UnknownLossType(_))));
    }

    #[test]
    fn serializes_with_dashes() {
        assert_eq!(serde_json::to_string(&LossType::WganGp).unwrap(), "\"wgan-gp\"");
    }
}
