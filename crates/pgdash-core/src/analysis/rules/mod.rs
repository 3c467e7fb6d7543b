pub mod config;
pub mod performance;

use super::{Issue, IssueContext};

pub trait IssueRule: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue>;
}

pub fn all_rules() -> Vec<Box<dyn IssueRule>> {
    vec![
        // Configuration
        Box::new(config::SharedBuffersLowRule),
        Box::new(config::EffectiveCacheSizeLowRule),
        Box::new(config::WorkMemLowRule),
        Box::new(config::MaxConnectionsHighRule),
        // Performance
        Box::new(performance::CacheHitRatioLowRule),
        Box::new(performance::SeqScanHeavyRule),
        Box::new(performance::UnusedIndexRule),
    ]
}
