//! SweepLoop - 期限切れ lease の定期回収
//!
//! ClaimBoard 自体はタイマーを持ちません。定期的に回収したい呼び出し側だけが
//! このループを起動します（push 型）。起動しなければ、必要なときに
//! `ClaimBoard::sweep` を直接呼ぶ（pull 型）。
//!
//! # フロー
//! 1. interval ごとに blocking pool で `sweep()` を実行
//! 2. 結果をコールバックに渡す（失敗はログに残して次の tick へ）
//! 3. shutdown_tx が true になるか drop されたら抜ける

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use super::board::ClaimBoard;
use super::sweep::SweepReport;

/// Handle to a running sweep loop.
/// - `request_shutdown()` でループを止める（実行中の sweep は最後まで走る）
/// - `shutdown_and_join()` で停止を待てる
pub struct SweepLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepLoop {
    /// Spawns a loop that sweeps every `every`, starting immediately.
    pub fn spawn(board: Arc<ClaimBoard>, every: Duration) -> Self {
        Self::spawn_with(board, every, |_| {})
    }

    /// Like `spawn`, calling `on_sweep` after each successful sweep.
    pub fn spawn_with(
        board: Arc<ClaimBoard>,
        every: Duration,
        on_sweep: impl Fn(&SweepReport) + Send + 'static,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(sweep_loop(board, every, on_sweep, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already have exited
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn sweep_loop(
    board: Arc<ClaimBoard>,
    every: Duration,
    on_sweep: impl Fn(&SweepReport) + Send + 'static,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let board = Arc::clone(&board);
        match tokio::task::spawn_blocking(move || board.sweep()).await {
            Ok(Ok(report)) => on_sweep(&report),
            Ok(Err(e)) => warn!(error = %e, "sweep failed"),
            Err(e) => warn!(error = %e, "sweep task did not complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OwnerId, TaskKey};
    use crate::impls::MemoryClaimStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loop_reclaims_expired_leases_until_shutdown() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let board = Arc::new(ClaimBoard::new(
            Arc::new(MemoryClaimStore::new()),
            clock.clone(),
        ));
        let task = TaskKey::new("lint-1").unwrap();
        board
            .claim_with_ttl(&task, &OwnerId::new("agent-A").unwrap(), 300)
            .unwrap();
        clock.advance(chrono::Duration::seconds(301));

        let reclaimed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reclaimed);
        let sweeper = SweepLoop::spawn_with(board.clone(), Duration::from_millis(10), move |r| {
            counter.fetch_add(r.count(), Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        sweeper.shutdown_and_join().await;

        assert_eq!(board.lease(&task).unwrap(), None);
        assert_eq!(reclaimed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_loop() {
        let board = Arc::new(ClaimBoard::new(
            Arc::new(MemoryClaimStore::new()),
            Arc::new(FixedClock::new(Utc::now())),
        ));
        let sweeper = SweepLoop::spawn(board, Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown_and_join())
            .await
            .expect("loop exits promptly");
    }
}
