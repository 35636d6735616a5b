//! Database repositories
//!
//! One repository per aggregate, in the same style throughout: unit structs
//! with static async methods over a `PgPool` or an open transaction.

pub mod catalog_repo;
pub mod grant_repo;
pub mod outbox_repo;
pub mod promotion_repo;
pub mod reward_repo;
pub mod tier_repo;

pub use catalog_repo::CatalogRepository;
pub use grant_repo::GrantRepository;
pub use outbox_repo::OutboxRepository;
pub use promotion_repo::PromotionRepository;
pub use reward_repo::RewardRepository;
pub use tier_repo::TierRepository;
