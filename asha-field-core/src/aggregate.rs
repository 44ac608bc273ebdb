//! Dashboard figures derived from a record snapshot.
//!
//! Nothing here is stored; every figure is recomputed from the snapshot on
//! each call.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{ModuleKey, Record, RosterMember, SyncStatus};
use crate::store::Snapshot;

/// Default look-back window for "recent activity".
pub const DEFAULT_RECENT_DAYS: i64 = 7;

/// Which records a summary covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every record on the device.
    Device,
    /// Records created by one worker.
    Owner(String),
}

impl Scope {
    fn includes(&self, record: &Record) -> bool {
        match self {
            Scope::Device => true,
            Scope::Owner(id) => record.owner_id == *id,
        }
    }
}

/// Record counts by sync status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub syncing: usize,
    pub synced: usize,
    pub failed: usize,
    /// Records created within the recent-activity window.
    pub recent: usize,
}

impl StatusCounts {
    fn add_record(&mut self, record: &Record, since: DateTime<Utc>, now: DateTime<Utc>) {
        self.total += 1;
        match record.status {
            SyncStatus::Pending => self.pending += 1,
            SyncStatus::Syncing => self.syncing += 1,
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Failed => self.failed += 1,
        }
        if matches!(record.created_at, Some(at) if at >= since && at <= now) {
            self.recent += 1;
        }
    }

    fn merge(&mut self, other: &StatusCounts) {
        self.total += other.total;
        self.pending += other.pending;
        self.syncing += other.syncing;
        self.synced += other.synced;
        self.failed += other.failed;
        self.recent += other.recent;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub totals: StatusCounts,
    pub modules: BTreeMap<ModuleKey, StatusCounts>,
}

impl DashboardSummary {
    /// Counts for one module; zero when it has no records in scope.
    pub fn module(&self, module: ModuleKey) -> StatusCounts {
        self.modules.get(&module).copied().unwrap_or_default()
    }
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total records: {}  Pending: {}  Synced: {}  Failed: {}  Recent: {}",
            self.totals.total,
            self.totals.pending + self.totals.syncing,
            self.totals.synced,
            self.totals.failed,
            self.totals.recent
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<24} {:>6} {:>8} {:>7} {:>7}",
            "Module", "Total", "Pending", "Synced", "Failed"
        )?;
        for module in ModuleKey::ALL {
            let c = self.module(module);
            writeln!(
                f,
                "{:<24} {:>6} {:>8} {:>7} {:>7}",
                module.title(),
                c.total,
                c.pending + c.syncing,
                c.synced,
                c.failed
            )?;
        }
        Ok(())
    }
}

/// Summarizes the records in `snapshot` that fall within `scope`.
///
/// A record is recent when its creation time lies in `[now - window, now]`.
/// Records without a creation time still count toward the totals.
pub fn summarize(
    snapshot: &Snapshot,
    scope: &Scope,
    now: DateTime<Utc>,
    window: Duration,
) -> DashboardSummary {
    // Windows reaching past chrono's range cover all of history.
    let since = now
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut summary = DashboardSummary::default();

    for module in ModuleKey::ALL {
        let mut counts = StatusCounts::default();
        for record in snapshot
            .get(&module)
            .into_iter()
            .flatten()
            .filter(|r| scope.includes(r))
        {
            counts.add_record(record, since, now);
        }
        summary.totals.merge(&counts);
        summary.modules.insert(module, counts);
    }

    summary
}

/// One roster member's figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub member: RosterMember,
    pub summary: DashboardSummary,
}

/// PHC view over every ASHA worker on the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhcRollup {
    pub roster_size: usize,
    pub totals: StatusCounts,
    pub workers: Vec<WorkerSummary>,
}

impl fmt::Display for PhcRollup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ASHA workers: {}", self.roster_size)?;
        writeln!(
            f,
            "Households: {}  Pending: {}  Recent: {}",
            self.totals.total,
            self.totals.pending + self.totals.syncing,
            self.totals.recent
        )?;
        if self.workers.is_empty() {
            return Ok(());
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<12} {:<20} {:>6} {:>8} {:>7}",
            "ASHA ID", "Name", "Total", "Pending", "Recent"
        )?;
        for worker in &self.workers {
            let c = worker.summary.totals;
            writeln!(
                f,
                "{:<12} {:<20} {:>6} {:>8} {:>7}",
                worker.member.asha_id,
                worker.member.name,
                c.total,
                c.pending + c.syncing,
                c.recent
            )?;
        }
        Ok(())
    }
}

/// Summarizes each roster member's records, plus totals across the roster.
///
/// Records owned by workers not on the roster are not counted.
pub fn phc_rollup(
    snapshot: &Snapshot,
    roster: &[RosterMember],
    now: DateTime<Utc>,
    window: Duration,
) -> PhcRollup {
    let mut rollup = PhcRollup {
        roster_size: roster.len(),
        ..PhcRollup::default()
    };

    for member in roster {
        let summary = summarize(snapshot, &Scope::Owner(member.asha_id.clone()), now, window);
        rollup.totals.merge(&summary.totals);
        rollup.workers.push(WorkerSummary {
            member: member.clone(),
            summary,
        });
    }

    rollup
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn record(
        module: ModuleKey,
        seq: u64,
        owner: &str,
        status: SyncStatus,
        days_ago: i64,
    ) -> Record {
        let mut record = Record::new(module, module.format_id(seq), Default::default(), owner)
            .with_created_at(now() - Duration::days(days_ago));
        record.status = status;
        record
    }

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            ModuleKey::Pregnancy,
            vec![
                record(ModuleKey::Pregnancy, 1, "ASHA-1", SyncStatus::Pending, 1),
                record(ModuleKey::Pregnancy, 2, "ASHA-1", SyncStatus::Synced, 30),
                record(ModuleKey::Pregnancy, 3, "ASHA-2", SyncStatus::Failed, 2),
            ],
        );
        snapshot.insert(
            ModuleKey::Referrals,
            vec![record(
                ModuleKey::Referrals,
                1,
                "ASHA-2",
                SyncStatus::Syncing,
                0,
            )],
        );
        snapshot
    }

    fn week() -> Duration {
        Duration::days(DEFAULT_RECENT_DAYS)
    }

    #[test]
    fn test_device_scope_counts_everything() {
        let summary = summarize(&snapshot(), &Scope::Device, now(), week());

        assert_eq!(summary.totals.total, 4);
        assert_eq!(summary.totals.pending, 1);
        assert_eq!(summary.totals.syncing, 1);
        assert_eq!(summary.totals.synced, 1);
        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.totals.recent, 3);
        assert_eq!(summary.module(ModuleKey::Pregnancy).total, 3);
        assert_eq!(summary.module(ModuleKey::ChildHealth).total, 0);
    }

    #[test]
    fn test_owner_scope_filters_by_owner() {
        let summary = summarize(
            &snapshot(),
            &Scope::Owner("ASHA-1".into()),
            now(),
            week(),
        );

        assert_eq!(summary.totals.total, 2);
        assert_eq!(summary.totals.pending, 1);
        assert_eq!(summary.totals.recent, 1);
        assert_eq!(summary.module(ModuleKey::Referrals).total, 0);
    }

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let summary = summarize(&Snapshot::new(), &Scope::Device, now(), week());
        assert_eq!(summary.totals, StatusCounts::default());
        assert_eq!(summary.modules.len(), ModuleKey::COUNT);
    }

    #[test]
    fn test_records_without_created_at_are_not_recent() {
        let mut legacy = record(ModuleKey::ChildHealth, 1, "ASHA-1", SyncStatus::Pending, 0);
        legacy.created_at = None;
        let mut snapshot = Snapshot::new();
        snapshot.insert(ModuleKey::ChildHealth, vec![legacy]);

        let summary = summarize(&snapshot, &Scope::Device, now(), week());

        assert_eq!(summary.totals.total, 1);
        assert_eq!(summary.totals.recent, 0);
    }

    #[test]
    fn test_window_past_calendar_range_counts_all_history() {
        let window = Duration::try_days(100_000_000).unwrap();

        let summary = summarize(&snapshot(), &Scope::Device, now(), window);

        assert_eq!(summary.totals.total, 4);
        assert_eq!(summary.totals.recent, 4);
    }

    #[test]
    fn test_phc_rollup_covers_roster_only() {
        let roster = vec![
            RosterMember::new("ASHA-1", "Meena"),
            RosterMember::new("ASHA-3", "Lata"),
        ];

        let rollup = phc_rollup(&snapshot(), &roster, now(), week());

        assert_eq!(rollup.roster_size, 2);
        assert_eq!(rollup.totals.total, 2);
        assert_eq!(rollup.totals.pending, 1);
        assert_eq!(rollup.workers[0].summary.totals.total, 2);
        assert_eq!(rollup.workers[1].summary.totals.total, 0);
    }

    #[test]
    fn test_summary_display_lists_every_module() {
        let text = summarize(&snapshot(), &Scope::Device, now(), week()).to_string();
        for module in ModuleKey::ALL {
            assert!(text.contains(module.title()));
        }
    }
}
