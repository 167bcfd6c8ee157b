//! ESP-IDF-backed implementations of `meshx::platform`'s traits.
//!
//! Mirrors the original's `port/esp32/rtos/esp_meshx_task.c` (task
//! spawn) and `port/rtos/FreeRTOS/FreeRTOS_meshx_utils.c` (clock/timer):
//! here they become thin wrappers over `esp-idf-hal`/`esp-idf-svc`
//! instead of direct FreeRTOS API calls.

use std::sync::Mutex;
use std::time::Duration;

use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};
use log::warn;
use meshx::error::{MeshxError, Result};
use meshx::platform::{Clock, TaskSpawner, Timer};

/// Wall-clock time via `std::time::Instant`, matching the original's
/// `meshx_rtos_get_time_ms` (FreeRTOS tick count converted to a
/// monotonic duration).
pub struct EspClock {
    start: std::time::Instant,
}

impl EspClock {
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

impl Default for EspClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for EspClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A one-shot, restartable timer backed by `esp_idf_svc::timer::EspTimer`
/// (`meshx_rtos_timer_t`'s ESP-IDF port). `on_fire` is invoked on the
/// timer service's own task each time the period elapses; `meshx-node`
/// uses this to flush [`meshx::storage::PersistStore`] once the NVS
/// write burst has settled (spec.md §6.4).
pub struct EspStabilityTimer {
    service: EspTaskTimerService,
    armed: Mutex<Option<EspTimer<'static>>>,
    on_fire: std::sync::Arc<dyn Fn() + Send + Sync>,
}

impl EspStabilityTimer {
    pub fn new(service: EspTaskTimerService, on_fire: std::sync::Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { service, armed: Mutex::new(None), on_fire }
    }
}

impl Timer for EspStabilityTimer {
    fn start(&self, period: Duration) -> Result<()> {
        let on_fire = self.on_fire.clone();
        let timer = self
            .service
            .timer(move || on_fire())
            .map_err(|err| MeshxError::Platform(err.to_string()))?;
        timer.after(period).map_err(|err| MeshxError::Platform(err.to_string()))?;
        *self.armed.lock().expect("stability timer lock poisoned") = Some(timer);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(timer) = self.armed.lock().expect("stability timer lock poisoned").take() {
            if let Err(err) = timer.cancel() {
                warn!("stability timer: cancel failed: {err:?}");
            }
        }
        Ok(())
    }
}

/// Spawns a named worker task. `meshx`'s own TXCM worker uses
/// `std::thread` directly (it is host-portable); this is for
/// `meshx-node`'s own element-level workers that want the original's
/// name/stack-size/priority shape (`meshx_task_t`).
pub struct EspTaskSpawner;

impl TaskSpawner for EspTaskSpawner {
    fn spawn(&self, name: &str, stack_size: usize, _priority: i32, body: Box<dyn FnOnce() + Send>) -> Result<()> {
        std::thread::Builder::new()
            .name(name.to_string())
            .stack_size(stack_size)
            .spawn(body)
            .map_err(|err| MeshxError::Platform(err.to_string()))?;
        Ok(())
    }
}
