use serde::{Deserialize, Serialize};

/// Side of the binary market (UP or DOWN)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Up,
    Down,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Up => "UP",
            Side::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UP" | "YES" => Ok(Side::Up),
            "DOWN" | "NO" => Ok(Side::Down),
            other => Err(format!("invalid side '{}'; expected up|down", other)),
        }
    }
}

/// Exposure key: at most one order may be in flight per (asset, side)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub asset: String,
    pub side: Side,
}

impl MarketKey {
    pub fn new(asset: impl Into<String>, side: Side) -> Self {
        Self {
            asset: asset.into(),
            side,
        }
    }
}

impl std::fmt::Display for MarketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.asset, self.side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse_aliases() {
        assert_eq!("up".parse::<Side>().unwrap(), Side::Up);
        assert_eq!(" No ".parse::<Side>().unwrap(), Side::Down);
        assert!("sideways".parse::<Side>().is_err());
    }

    #[test]
    fn test_market_key_display() {
        assert_eq!(MarketKey::new("BTC", Side::Down).to_string(), "BTC/DOWN");
    }
}
