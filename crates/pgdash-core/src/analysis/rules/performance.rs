use crate::analysis::rules::IssueRule;
use crate::analysis::{Category, Issue, IssueContext, Severity};
use crate::backend::total_cache_hit_ratio;

const CACHE_HIT_MIN_PCT: f64 = 90.0;
const SEQ_SCAN_MIN_SCANS: i64 = 1000;
const SEQ_SCAN_MIN_ROWS: i64 = 100_000;
const SEQ_SCAN_MAX_REPORTED: usize = 5;
const UNUSED_INDEX_MAX_REPORTED: usize = 10;

// ============================================================
// CacheHitRatioLowRule
// ============================================================

pub struct CacheHitRatioLowRule;

impl IssueRule for CacheHitRatioLowRule {
    fn id(&self) -> &'static str {
        "cache_hit_ratio_low"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let Some(ratio) = ctx.database_stats.and_then(total_cache_hit_ratio) else {
            return Vec::new();
        };
        if ratio >= CACHE_HIT_MIN_PCT {
            return Vec::new();
        }
        vec![Issue {
            rule_id: self.id(),
            category: Category::Performance,
            severity: Severity::Critical,
            title: format!("Cache hit ratio is {:.2}%, should be > 90%", ratio),
            recommendation: "Increase shared_buffers or investigate query patterns".to_string(),
            detail: None,
        }]
    }
}

// ============================================================
// SeqScanHeavyRule: tables read mostly by sequential scans
// ============================================================

pub struct SeqScanHeavyRule;

impl IssueRule for SeqScanHeavyRule {
    fn id(&self) -> &'static str {
        "seq_scan_heavy"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let Some(tables) = ctx.table_stats else {
            return Vec::new();
        };
        let mut heavy: Vec<_> = tables
            .iter()
            .filter(|t| t.seq_scan > SEQ_SCAN_MIN_SCANS && t.seq_tup_read > SEQ_SCAN_MIN_ROWS)
            .collect();
        heavy.sort_by(|a, b| b.seq_tup_read.cmp(&a.seq_tup_read));

        heavy
            .into_iter()
            .take(SEQ_SCAN_MAX_REPORTED)
            .map(|t| Issue {
                rule_id: self.id(),
                category: Category::Performance,
                severity: Severity::Warning,
                title: format!(
                    "Table {} has {} sequential scans",
                    t.qualified_name(),
                    t.seq_scan
                ),
                recommendation: "Consider adding indexes to reduce sequential scans".to_string(),
                detail: Some(format!("Table: {}", t.qualified_name())),
            })
            .collect()
    }
}

// ============================================================
// UnusedIndexRule
// ============================================================

pub struct UnusedIndexRule;

impl IssueRule for UnusedIndexRule {
    fn id(&self) -> &'static str {
        "unused_index"
    }

    fn evaluate(&self, ctx: &IssueContext) -> Vec<Issue> {
        let Some(indexes) = ctx.index_stats else {
            return Vec::new();
        };
        indexes
            .iter()
            .filter(|i| i.idx_scan == 0 && !i.indexname.ends_with("_pkey"))
            .take(UNUSED_INDEX_MAX_REPORTED)
            .map(|i| Issue {
                rule_id: self.id(),
                category: Category::Performance,
                severity: Severity::Info,
                title: format!(
                    "Index {} on {}.{} is never used",
                    i.indexname, i.schemaname, i.tablename
                ),
                recommendation: "Consider dropping unused indexes to improve write performance"
                    .to_string(),
                detail: Some(format!("Index: {}", i.indexname)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DatabaseStats, IndexStats, MockData, TableStats};

    fn with_tables(tables: &[TableStats]) -> IssueContext<'_> {
        IssueContext {
            table_stats: Some(tables),
            ..Default::default()
        }
    }

    #[test]
    fn low_cache_hit_ratio_is_critical() {
        let mut stats: Vec<DatabaseStats> = MockData::demo().database_stats;
        for db in &mut stats {
            db.blks_hit = 85;
            db.blks_read = 15;
        }
        let issues = CacheHitRatioLowRule.evaluate(&IssueContext {
            database_stats: Some(&stats),
            ..Default::default()
        });
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].title, "Cache hit ratio is 85.00%, should be > 90%");
    }

    #[test]
    fn healthy_or_idle_cache_is_not_flagged() {
        let demo = MockData::demo();
        let ctx = IssueContext {
            database_stats: Some(&demo.database_stats),
            ..Default::default()
        };
        assert!(CacheHitRatioLowRule.evaluate(&ctx).is_empty());

        let mut idle = demo.database_stats.clone();
        for db in &mut idle {
            db.blks_hit = 0;
            db.blks_read = 0;
        }
        let ctx = IssueContext {
            database_stats: Some(&idle),
            ..Default::default()
        };
        assert!(CacheHitRatioLowRule.evaluate(&ctx).is_empty());
    }

    #[test]
    fn seq_scan_heavy_tables_ordered_by_rows_read() {
        let mut tables = MockData::demo().table_stats;
        tables.reverse();
        let issues = SeqScanHeavyRule.evaluate(&with_tables(&tables));
        let titles: Vec<_> = issues.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Table public.orders has 14500 sequential scans",
                "Table public.events has 2300 sequential scans",
            ]
        );
    }

    #[test]
    fn seq_scan_reports_at_most_five() {
        let template = MockData::demo().table_stats[0].clone();
        let tables: Vec<TableStats> = (0..8)
            .map(|n| TableStats {
                relname: format!("t{}", n),
                seq_tup_read: 200_000 + n,
                ..template.clone()
            })
            .collect();
        let issues = SeqScanHeavyRule.evaluate(&with_tables(&tables));
        assert_eq!(issues.len(), 5);
        assert_eq!(issues[0].detail.as_deref(), Some("Table: public.t7"));
    }

    #[test]
    fn unused_indexes_skip_primary_keys() {
        let indexes = MockData::demo().index_stats;
        let issues = UnusedIndexRule.evaluate(&IssueContext {
            index_stats: Some(&indexes),
            ..Default::default()
        });
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].title,
            "Index events_legacy_type_idx on public.events is never used"
        );
    }

    #[test]
    fn unused_indexes_capped_at_ten() {
        let indexes: Vec<IndexStats> = (0..15)
            .map(|n| IndexStats {
                schemaname: "public".to_string(),
                tablename: "t".to_string(),
                indexname: format!("t_c{}_idx", n),
                idx_scan: 0,
                idx_tup_read: 0,
                idx_tup_fetch: 0,
            })
            .collect();
        let issues = UnusedIndexRule.evaluate(&IssueContext {
            index_stats: Some(&indexes),
            ..Default::default()
        });
        assert_eq!(issues.len(), 10);
    }
}
