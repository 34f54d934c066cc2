//! Platform Configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stripe::Currency;

/// Platform-wide checkout and payee-account settings
#[derive(Clone, Debug)]
pub struct PlatformConfig {
    /// Fallback origin when a request carries none
    pub base_url: String,

    /// Platform commission as a fraction of the base amount
    pub fee_percent: Decimal,

    /// Smallest sellable price, in minor units
    pub min_price_cents: i64,

    /// Single settlement currency for the whole marketplace
    pub currency: Currency,

    /// Business-profile description sent on payee account creation
    pub product_description: String,

    /// Merchant category code: 8299, educational services
    pub mcc: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".into(),
            fee_percent: dec!(0.30),
            min_price_cents: 100,
            currency: Currency::USD,
            product_description: "Online course sales".into(),
            mcc: "8299".into(),
        }
    }
}

impl PlatformConfig {
    /// Create from environment variables, with defaults for everything
    /// except the base URL in production setups.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("PLATFORM_BASE_URL") {
            config.base_url = base_url;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fee_is_thirty_percent() {
        let config = PlatformConfig::default();
        assert_eq!(config.fee_percent, dec!(0.30));
        assert_eq!(config.min_price_cents, 100);
    }
}
