//! Concrete model adapters (C4): encode/decode per-model state payloads
//! and bind them to [`crate::model::client::ClientRegistry`] /
//! [`crate::model::server::ServerRegistry`].
//!
//! Two families, matching the original's `base_model_generic`/
//! `base_model_light` split: [`generic`] (OnOff, Level, Power OnOff,
//! Power Level, Location, Property) and [`light`] (Lightness, CTL, HSL,
//! xyL, LC).

pub mod generic;
pub mod light;

/// Event keys published on [`crate::bus::Topic::ElStateCh`]
/// (spec.md §4.1: "event key = state-change kind (e.g. `SET_ON_OFF`,
/// `SET_CTL`, ...)"). Centralized so adapters across both families
/// agree on disjoint keys.
pub mod el_event {
    pub const SET_ON_OFF: u32 = 1;
    pub const SET_LEVEL: u32 = 2;
    pub const SET_POWER_ONOFF: u32 = 3;
    pub const SET_POWER_LEVEL: u32 = 4;
    pub const SET_LOCATION: u32 = 5;
    pub const SET_PROPERTY: u32 = 6;
    pub const SET_LIGHTNESS: u32 = 7;
    pub const SET_CTL: u32 = 8;
    pub const SET_HSL: u32 = 9;
    pub const SET_XYL: u32 = 10;
    pub const SET_LC: u32 = 11;
}

/// Little-endian payload helpers shared by every concrete adapter.
/// Intentionally tiny: the original hand-rolls `memcpy` into packed
/// structs per model; this is the same thing without UB, and without a
/// serde-derived wire format (the payload is a fixed, small, per-opcode
/// byte layout — serde would be overkill and `meshx`'s `serde`/
/// `serde_json` dependency is reserved for config/diagnostic surfaces,
/// not the access-layer wire format).
pub(crate) mod wire {
    pub fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
        buf.get(offset..offset + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
        buf.get(offset).copied()
    }

    pub fn push_u16(buf: &mut Vec<u8>, value: u16) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_u8(buf: &mut Vec<u8>, value: u8) {
        buf.push(value);
    }
}
