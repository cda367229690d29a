//! Foreground app tracking
//!
//! A single cell updated from the window-focus feed and read by
//! `get_current_app`. May briefly lag the real foreground app.

use crate::capability::WindowFocusEvent;
use agent_shared::defaults;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ForegroundAppState {
    last_package: Arc<RwLock<String>>,
}

impl ForegroundAppState {
    pub fn new() -> Self {
        Self {
            last_package: Arc::new(RwLock::new(defaults::UNKNOWN_FOREGROUND_APP.to_string())),
        }
    }

    pub async fn last_package(&self) -> String {
        self.last_package.read().await.clone()
    }

    pub async fn update(&self, package: impl Into<String>) {
        *self.last_package.write().await = package.into();
    }

    /// Spawn the task that applies focus events until the feed closes
    pub fn track(&self, mut feed: mpsc::Receiver<WindowFocusEvent>) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                if event.package.is_empty() {
                    continue;
                }
                debug!("[FOCUS] {}", event.package);
                state.update(event.package).await;
            }
            info!("[FOCUS] Focus feed closed");
        })
    }
}

impl Default for ForegroundAppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_package() {
        let state = ForegroundAppState::new();
        assert_eq!(state.last_package().await, "N/A");
    }

    #[tokio::test]
    async fn test_track_applies_latest_event() {
        let state = ForegroundAppState::new();
        let (tx, rx) = mpsc::channel(8);
        let task = state.track(rx);

        for package in ["com.a", "", "com.b"] {
            tx.send(WindowFocusEvent {
                package: package.to_string(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(state.last_package().await, "com.b");
    }
}
