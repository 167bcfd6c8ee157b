//! Unit-test console (spec.md §6.2): `ut <module_id> <cmd_id> <argc>
//! [args...]`.
//!
//! spec.md calls this "out of core scope, described for completeness",
//! but `original_source/.../unit_test.c` shows a real, small dispatcher
//! (a fixed-size `callback_list[MODULE_ID_MAX]` array, looked up by
//! module id) that the core itself uses to register module 3 (TXCM) and
//! the NVS module's commands. This is that dispatcher, minus the ESP
//! console/argtable3 wiring — `meshx-node` is responsible for reading a
//! line from a real console and handing it to [`UnitTestConsole::dispatch_line`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{MeshxError, Result};

/// Module id a unit-test callback is registered under. The original
/// reserves a fixed `MODULE_ID_MAX` range; `meshx` only ever registers
/// [`MODULE_ID_TXCM`].
pub type ModuleId = u16;

/// TXCM's reserved module id (spec.md §6.2: "the core itself only
/// registers module 3 (TXCM)").
pub const MODULE_ID_TXCM: ModuleId = 3;
/// NVS/storage's reserved module id, matching the original's
/// `MODULE_ID_COMPONENT_MESHX_NVS` registration in `meshx_nvs_init`.
pub const MODULE_ID_NVS: ModuleId = 4;

pub type UtCallback = Arc<dyn Fn(u16, &[String]) -> Result<()> + Send + Sync>;

/// The `ut` command dispatcher: `module_id -> callback`. Re-registering
/// a module id replaces its callback, matching the original's plain
/// array-slot assignment (no duplicate-registration error).
#[derive(Default)]
pub struct UnitTestConsole {
    callbacks: Mutex<HashMap<ModuleId, UtCallback>>,
}

impl UnitTestConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, module_id: ModuleId, callback: UtCallback) {
        self.callbacks.lock().expect("unit test console lock poisoned").insert(module_id, callback);
    }

    /// Dispatch a single already-parsed command. Returns `Ok(())` on
    /// success, or the error the module's callback returned /
    /// [`MeshxError::NotFound`] if no module is registered under
    /// `module_id`.
    pub fn dispatch(&self, module_id: ModuleId, cmd_id: u16, args: &[String]) -> Result<()> {
        let callback = {
            let callbacks = self.callbacks.lock().expect("unit test console lock poisoned");
            callbacks.get(&module_id).cloned()
        };
        match callback {
            Some(cb) => cb(cmd_id, args),
            None => Err(MeshxError::NotFound),
        }
    }

    /// Parse and dispatch a raw `ut <module_id> <cmd_id> <argc>
    /// [args...]` line (the `ut` token itself is optional — a console
    /// adapter that already split on whitespace can pass the remainder).
    pub fn dispatch_line(&self, line: &str) -> Result<()> {
        let mut tokens = line.split_whitespace();
        if tokens.clone().next() == Some("ut") {
            tokens.next();
        }

        let module_id: ModuleId = tokens.next().ok_or(MeshxError::InvalidArg)?.parse().map_err(|_| MeshxError::InvalidArg)?;
        let cmd_id: u16 = tokens.next().ok_or(MeshxError::InvalidArg)?.parse().map_err(|_| MeshxError::InvalidArg)?;
        let argc: usize = tokens.next().ok_or(MeshxError::InvalidArg)?.parse().map_err(|_| MeshxError::InvalidArg)?;

        let args: Vec<String> = tokens.map(str::to_string).collect();
        if args.len() < argc {
            return Err(MeshxError::InvalidArg);
        }

        self.dispatch(module_id, cmd_id, &args[..argc])
    }
}
