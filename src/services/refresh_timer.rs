//! 主动刷新定时器
//! 启动时立即检查一次，之后按固定间隔检查

use crate::services::session_service::{RefreshOutcome, SessionManager};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct RefreshTimer {
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    /// 启动后台检查任务
    pub fn spawn(session: Arc<SessionManager>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match session.refresh_if_expiring(Utc::now()).await {
                    Ok(RefreshOutcome::Refreshed) => {
                        tracing::info!("Proactive refresh completed");
                    }
                    Ok(outcome) => {
                        tracing::trace!(?outcome, "Proactive refresh check");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Proactive refresh check failed");
                    }
                }
            }
        });

        tracing::debug!(interval_secs = interval.as_secs(), "Refresh timer started");
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止定时器；进行中的刷新随任务一起中止
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Refresh timer stopped");
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.abort();
    }
}
