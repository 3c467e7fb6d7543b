use crate::analysis::rules::IssueRule;
use crate::analysis::{Category, Issue, IssueContext, Severity};

/// Block size used by `shared_buffers` and `effective_cache_size`.
const BLOCK_KB: i64 = 8;

fn setting_i64(ctx: &IssueContext, name: &str) -> Option<i64> {
    ctx.setting(name)?.trim().parse().ok()
}

fn blocks_to_mb(blocks: i64) -> i64 {
    blocks * BLOCK_KB / 1024
}

// ============================================================
// SharedBuffersLowRule
// ============================================================

pub struct SharedBuffersLowRule;

impl IssueRule for SharedBuffersLowRule {
    fn id(&self) -> &'static str {
        "shared_buffers_low"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let (Some(blocks), Some(hw)) = (setting_i64(ctx, "shared_buffers"), ctx.hardware) else {
            return Vec::new();
        };
        let current_mb = blocks_to_mb(blocks);
        let recommended_mb = (hw.total_memory_mb as f64 * 0.25).min(8192.0) as i64;
        if current_mb >= recommended_mb / 2 {
            return Vec::new();
        }
        vec![Issue {
            rule_id: self.id(),
            category: Category::Configuration,
            severity: Severity::Warning,
            title: "shared_buffers is too low".to_string(),
            recommendation: "Recommended: 25% of RAM (max 8GB)".to_string(),
            detail: Some(format!(
                "current {}MB, recommended {}MB",
                current_mb, recommended_mb
            )),
        }]
    }
}

// ============================================================
// EffectiveCacheSizeLowRule
// ============================================================

pub struct EffectiveCacheSizeLowRule;

impl IssueRule for EffectiveCacheSizeLowRule {
    fn id(&self) -> &'static str {
        "effective_cache_size_low"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let (Some(blocks), Some(hw)) = (setting_i64(ctx, "effective_cache_size"), ctx.hardware)
        else {
            return Vec::new();
        };
        let current_mb = blocks_to_mb(blocks);
        let recommended_mb = (hw.total_memory_mb as f64 * 0.75) as i64;
        if current_mb >= recommended_mb / 2 {
            return Vec::new();
        }
        vec![Issue {
            rule_id: self.id(),
            category: Category::Configuration,
            severity: Severity::Info,
            title: "effective_cache_size is low".to_string(),
            recommendation: "Recommended: 50-75% of total RAM".to_string(),
            detail: Some(format!(
                "current {}MB, recommended {}MB",
                current_mb, recommended_mb
            )),
        }]
    }
}

// ============================================================
// WorkMemLowRule
// ============================================================

pub struct WorkMemLowRule;

impl IssueRule for WorkMemLowRule {
    fn id(&self) -> &'static str {
        "work_mem_low"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let Some(kb) = setting_i64(ctx, "work_mem") else {
            return Vec::new();
        };
        let current_mb = kb / 1024;
        if current_mb >= 4 {
            return Vec::new();
        }
        vec![Issue {
            rule_id: self.id(),
            category: Category::Configuration,
            severity: Severity::Info,
            title: "work_mem is very low".to_string(),
            recommendation: "Low work_mem slows sort and hash operations; consider 10-50MB"
                .to_string(),
            detail: Some(format!("current {}MB, recommended 10-50MB", current_mb)),
        }]
    }
}

// ============================================================
// MaxConnectionsHighRule
// ============================================================

pub struct MaxConnectionsHighRule;

impl IssueRule for MaxConnectionsHighRule {
    fn id(&self) -> &'static str {
        "max_connections_high"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let (Some(max_conn), Some(hw)) = (setting_i64(ctx, "max_connections"), ctx.hardware)
        else {
            return Vec::new();
        };
        let recommended = (hw.cpu_cores as i64 * 50).min(200);
        if max_conn <= recommended * 2 {
            return Vec::new();
        }
        vec![Issue {
            rule_id: self.id(),
            category: Category::Configuration,
            severity: Severity::Warning,
            title: "max_connections is very high".to_string(),
            recommendation: "Too many connections may exhaust resources; consider a connection pooler"
                .to_string(),
            detail: Some(format!("current {}, recommended {}", max_conn, recommended)),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HardwareInfo, PgSetting};

    fn setting(name: &str, value: &str) -> PgSetting {
        PgSetting {
            name: name.to_string(),
            setting: value.to_string(),
            unit: None,
            category: "Resource Usage".to_string(),
            short_desc: None,
            source: "configuration file".to_string(),
            min_val: None,
            max_val: None,
        }
    }

    fn hardware(cores: i32, memory_mb: i64) -> HardwareInfo {
        HardwareInfo {
            cpu_cores: cores,
            total_memory_mb: memory_mb,
            postgres_version: "PostgreSQL 16.4".to_string(),
            os_type: "Linux".to_string(),
        }
    }

    fn eval(rule: &dyn IssueRule, settings: &[PgSetting], hw: &HardwareInfo) -> Vec<Issue> {
        rule.evaluate(&IssueContext {
            settings: Some(settings),
            hardware: Some(hw),
            ..Default::default()
        })
    }

    #[test]
    fn shared_buffers_below_half_of_recommended() {
        let hw = hardware(8, 16384);
        // 128MB vs recommended 4096MB
        let issues = eval(&SharedBuffersLowRule, &[setting("shared_buffers", "16384")], &hw);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(
            issues[0].detail.as_deref(),
            Some("current 128MB, recommended 4096MB")
        );

        // 2048MB is exactly half: not flagged
        let ok = eval(&SharedBuffersLowRule, &[setting("shared_buffers", "262144")], &hw);
        assert!(ok.is_empty());
    }

    #[test]
    fn shared_buffers_recommendation_caps_at_8gb() {
        let hw = hardware(32, 131072);
        // 4096MB is half of the 8GB cap
        let issues = eval(&SharedBuffersLowRule, &[setting("shared_buffers", "524288")], &hw);
        assert!(issues.is_empty());
        let issues = eval(&SharedBuffersLowRule, &[setting("shared_buffers", "524287")], &hw);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn effective_cache_size_is_info() {
        let hw = hardware(8, 16384);
        let issues = eval(
            &EffectiveCacheSizeLowRule,
            &[setting("effective_cache_size", "524288")],
            &hw,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Info);
        assert_eq!(
            issues[0].detail.as_deref(),
            Some("current 4096MB, recommended 12288MB")
        );
    }

    #[test]
    fn work_mem_under_4mb() {
        let hw = hardware(8, 16384);
        assert_eq!(
            eval(&WorkMemLowRule, &[setting("work_mem", "2048")], &hw).len(),
            1
        );
        assert!(eval(&WorkMemLowRule, &[setting("work_mem", "4096")], &hw).is_empty());
    }

    #[test]
    fn max_connections_above_twice_recommended() {
        // 2 cores -> recommended 100, flagged above 200
        let hw = hardware(2, 4096);
        assert!(eval(&MaxConnectionsHighRule, &[setting("max_connections", "200")], &hw).is_empty());
        let issues = eval(&MaxConnectionsHighRule, &[setting("max_connections", "201")], &hw);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].detail.as_deref(), Some("current 201, recommended 100"));
    }

    #[test]
    fn unparsable_or_missing_inputs_are_skipped() {
        let hw = hardware(8, 16384);
        assert!(eval(&SharedBuffersLowRule, &[setting("shared_buffers", "128MB")], &hw).is_empty());
        assert!(
            SharedBuffersLowRule
                .evaluate(&IssueContext::default())
                .is_empty()
        );
    }
}
