/// Reward unlocked when a referrer's indications counter lands exactly on
/// the tier threshold. Seeded externally, read-only from this service.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RewardTier {
    pub name: String,
    pub indications: i32,
    pub url: String,
}
