//! Referral discount tiers
//!
//! Maps the number of paid referrals to a discount percentage through a fixed,
//! ordered set of inclusive bands. The last band is open-ended so the mapping is
//! total: 100 or more paid referrals make the course free.

/// One inclusive band of paid-referral counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountBand {
    pub min: u32,
    /// `None` means no upper bound.
    pub max: Option<u32>,
    pub percent: u8,
}

impl DiscountBand {
    pub fn contains(&self, paid_referrals: u32) -> bool {
        paid_referrals >= self.min && self.max.is_none_or(|max| paid_referrals <= max)
    }
}

/// Bands in ascending order. Counts below the first band get no discount.
pub const DISCOUNT_BANDS: [DiscountBand; 4] = [
    DiscountBand {
        min: 1,
        max: Some(2),
        percent: 10,
    },
    DiscountBand {
        min: 3,
        max: Some(9),
        percent: 30,
    },
    DiscountBand {
        min: 10,
        max: Some(99),
        percent: 50,
    },
    DiscountBand {
        min: 100,
        max: None,
        percent: 100,
    },
];

/// Discount percentage for the given number of paid referrals.
pub fn discount_percent(paid_referrals: u32) -> u8 {
    DISCOUNT_BANDS
        .iter()
        .find(|band| band.contains(paid_referrals))
        .map(|band| band.percent)
        .unwrap_or(0)
}

/// Price in cents after applying the discount, floored at zero.
pub fn discounted_price_cents(base_price_cents: u64, paid_referrals: u32) -> u64 {
    let percent = u64::from(discount_percent(paid_referrals).min(100));
    base_price_cents.saturating_mul(100 - percent) / 100
}

/// Formats cents as `dollars.cents`, e.g. `1000` -> `10.00`.
pub fn format_price(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
