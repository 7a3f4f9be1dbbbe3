use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Times the congratulations banner. Each banner arms a new generation, and only the
/// timer of the latest generation may take the banner down.
#[derive(Debug, Clone, Default)]
pub struct BannerTimer {
    generation: Arc<AtomicU64>,
}

impl BannerTimer {
    pub fn arm(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Waits `delay`, then runs `on_clear` unless a newer banner was armed meanwhile.
    /// Returns whether `on_clear` ran.
    pub async fn clear_after<F>(&self, generation: u64, delay: Duration, on_clear: F) -> bool
    where
        F: FnOnce(),
    {
        tokio::time::sleep(delay).await;
        if !self.is_current(generation) {
            log::debug!("banner timer superseded generation={generation}");
            return false;
        }
        on_clear();
        true
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn start_congratulations_timer<R: tauri::Runtime>(
    app: tauri::AppHandle<R>,
    timer: BannerTimer,
    delay: Duration,
) {
    use tauri::Emitter;

    use crate::events::EVENT_CONGRATULATIONS_CLEARED;

    let generation = timer.arm();
    tauri::async_runtime::spawn(async move {
        timer
            .clear_after(generation, delay, move || {
                let _ = app.emit(EVENT_CONGRATULATIONS_CLEARED, ());
            })
            .await;
    });
}
