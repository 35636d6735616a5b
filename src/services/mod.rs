//! Business logic services

pub mod authoring;
pub mod compiler;
pub mod evaluator;
pub mod grants;
pub mod outbox_sweeper;
pub mod provider;
pub mod publisher;
pub mod segments;

pub use authoring::AuthoringService;
pub use compiler::{CompiledPromotion, PromotionCompiler};
pub use evaluator::{EvaluationInput, EvaluationOutcome, PromotionEvaluator};
pub use grants::{GrantRequest, GrantService};
pub use outbox_sweeper::OutboxSweeper;
pub use provider::{ActivePromotion, PromotionProvider};
pub use publisher::PublishService;
pub use segments::{RedisSegmentLookup, SegmentLookup};
