//! 出力整形（text / JSON）
//!
//! 人間向けは 1 行 1 レコード、`--json` では serde_json でそのまま出す。

use anyhow::Result;
use baton_core::app::{LeaseView, StatusReport, SweepReport};
use baton_core::domain::{Lease, ListedTask, OwnerId, TaskStatus};
use serde::Serialize;

fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn lease(lease: &Lease, as_json: bool) -> Result<()> {
    if as_json {
        return json(lease);
    }
    println!(
        "claimed {} for {} until {}",
        lease.task_id,
        lease.owner_id,
        lease.expires_at().to_rfc3339()
    );
    Ok(())
}

pub fn released(lease: &Lease, as_json: bool) -> Result<()> {
    if as_json {
        return json(lease);
    }
    println!("released {} ({})", lease.task_id, lease.owner_id);
    Ok(())
}

pub fn listing(owner: &OwnerId, rows: &[ListedTask], as_json: bool) -> Result<()> {
    if as_json {
        return json(rows);
    }
    if rows.is_empty() {
        println!("{owner} holds no tasks");
        return Ok(());
    }
    for row in rows {
        match &row.status {
            TaskStatus::Claimed { claimed_at } => {
                println!("{}\tclaimed\t{}", row.task_id, claimed_at.to_rfc3339())
            }
            TaskStatus::Orphaned => println!("{}\torphaned", row.task_id),
        }
    }
    Ok(())
}

pub fn leases(views: &[LeaseView], as_json: bool) -> Result<()> {
    if as_json {
        return json(views);
    }
    if views.is_empty() {
        println!("no leases");
        return Ok(());
    }
    for view in views {
        let state = if view.expired {
            "expired".to_string()
        } else {
            format!("{}s left", view.remaining_secs)
        };
        println!(
            "{}\t{}\t{}\t{}",
            view.lease.task_id,
            view.lease.owner_id,
            view.expires_at.to_rfc3339(),
            state
        );
    }
    Ok(())
}

pub fn sweep(report: &SweepReport, as_json: bool) -> Result<()> {
    if as_json {
        return json(report);
    }
    println!("reclaimed {} expired lease(s)", report.count());
    for lease in &report.reclaimed {
        println!("  {} (was {})", lease.task_id, lease.owner_id);
    }
    Ok(())
}

pub fn status(report: &StatusReport, as_json: bool) -> Result<()> {
    if as_json {
        return json(report);
    }
    println!("live leases:    {}", report.live_leases);
    println!("expired leases: {}", report.expired_leases);
    println!("owners:         {}", report.owners);
    println!("recent claims (last {}s):", report.recent_window_secs);
    if report.recent.is_empty() {
        println!("  none");
    }
    for claim in &report.recent {
        println!(
            "  {}\t{}\t{}",
            claim.task_id,
            claim.owner_id,
            claim.claimed_at.to_rfc3339()
        );
    }
    Ok(())
}
