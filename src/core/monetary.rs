/// Monetary constants for coinbase rewards
///
/// Values are expressed in the minimal reward unit. One coin is 10^12 minimal units.
///
/// Number of minimal units in one coin
pub const UNITS_PER_COIN: u64 = 1_000_000_000_000;

/// Fixed reward paid by every coinbase transaction (5 coins)
pub const COINBASE_REWARD: u64 = 5 * UNITS_PER_COIN;

/// Recipient key of every coinbase output unless the configuration overrides it
pub const REWARD_PUBKEY: &str = "6690a9f3e28f961532289de1835556bbb6dac5fdba43b7f8bf00fcbdbe1795a7";

/// Utility functions for monetary conversions
pub mod conversions {
    use super::*;

    /// Convert minimal units to coins
    ///
    /// # Examples
    /// ```
    /// use genesis_miner::core::monetary::conversions::units_to_coins;
    /// assert_eq!(units_to_coins(5_000_000_000_000), 5.0);
    /// ```
    pub fn units_to_coins(units: u64) -> f64 {
        units as f64 / UNITS_PER_COIN as f64
    }

    /// Format minimal units as a human-readable string
    ///
    /// # Examples
    /// ```
    /// use genesis_miner::core::monetary::conversions::format_units;
    /// assert_eq!(format_units(500_000_000_000), "0.500000000000 coins");
    /// ```
    pub fn format_units(units: u64) -> String {
        format!(
            "{}.{:012} coins",
            units / UNITS_PER_COIN,
            units % UNITS_PER_COIN
        )
    }
}
