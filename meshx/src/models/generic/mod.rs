//! The Generic family: OnOff, Level, Power OnOff, Power Level, Location,
//! Property. Grounded on `original_source/.../generic_model/*.cpp`
//! (`meshx_model_onoff.cpp`, `meshx_model_level.cpp`,
//! `meshx_model_power_onoff.cpp`, `meshx_model_power_level.cpp`,
//! `meshx_model_location.cpp`, `meshx_model_property.cpp`), each of
//! which is a template instantiation of the same CRTP base the original
//! used for both client and server; here they are six small adapters
//! over one [`GenericFamily`] impl of [`crate::model::ModelFamily`].

pub mod location;
pub mod onoff;
pub mod level;
pub mod power;
pub mod property;

use crate::error::Result;
use crate::model::ModelFamily;
use crate::types::{ModelId, Opcode};

/// Generic model ids, spelled out once so every adapter and the family's
/// classification tables agree on the same constants.
pub mod model_id {
    use crate::types::ModelId;

    pub const ONOFF_SERVER: ModelId = ModelId::new(0x1000);
    pub const ONOFF_CLIENT: ModelId = ModelId::new(0x1001);
    pub const LEVEL_SERVER: ModelId = ModelId::new(0x1002);
    pub const LEVEL_CLIENT: ModelId = ModelId::new(0x1003);
    pub const POWER_ONOFF_SERVER: ModelId = ModelId::new(0x1006);
    pub const POWER_ONOFF_SETUP_SERVER: ModelId = ModelId::new(0x1007);
    pub const POWER_ONOFF_CLIENT: ModelId = ModelId::new(0x1008);
    pub const POWER_LEVEL_SERVER: ModelId = ModelId::new(0x1009);
    pub const POWER_LEVEL_SETUP_SERVER: ModelId = ModelId::new(0x100A);
    pub const POWER_LEVEL_CLIENT: ModelId = ModelId::new(0x100B);
    pub const BATTERY_SERVER: ModelId = ModelId::new(0x100C);
    pub const BATTERY_CLIENT: ModelId = ModelId::new(0x100D);
    pub const LOCATION_SERVER: ModelId = ModelId::new(0x100E);
    pub const LOCATION_SETUP_SERVER: ModelId = ModelId::new(0x100F);
    pub const LOCATION_CLIENT: ModelId = ModelId::new(0x1010);
    pub const ADMIN_PROPERTY_SERVER: ModelId = ModelId::new(0x1011);
    pub const MANUFACTURER_PROPERTY_SERVER: ModelId = ModelId::new(0x1012);
    pub const USER_PROPERTY_SERVER: ModelId = ModelId::new(0x1013);
    pub const CLIENT_PROPERTY_SERVER: ModelId = ModelId::new(0x1014);
    pub const PROPERTY_CLIENT: ModelId = ModelId::new(0x1015);
}

/// Opcodes for every Generic sub-model the family recognizes (spec.md
/// §4.3.1's `meshx_is_unack_opcode`/`meshx_is_get_req_opcode` static
/// allow-lists, generalized to one classification table per family).
pub mod opcode {
    pub const ONOFF_GET: u16 = 0x8201;
    pub const ONOFF_SET: u16 = 0x8202;
    pub const ONOFF_SET_UNACK: u16 = 0x8203;
    pub const ONOFF_STATUS: u16 = 0x8204;

    pub const LEVEL_GET: u16 = 0x8205;
    pub const LEVEL_SET: u16 = 0x8206;
    pub const LEVEL_SET_UNACK: u16 = 0x8207;
    pub const LEVEL_STATUS: u16 = 0x8208;

    pub const ON_POWER_UP_GET: u16 = 0x8211;
    pub const ON_POWER_UP_STATUS: u16 = 0x8212;
    pub const ON_POWER_UP_SET: u16 = 0x8213;
    pub const ON_POWER_UP_SET_UNACK: u16 = 0x8214;

    pub const POWER_LEVEL_GET: u16 = 0x8215;
    pub const POWER_LEVEL_SET: u16 = 0x8216;
    pub const POWER_LEVEL_SET_UNACK: u16 = 0x8217;
    pub const POWER_LEVEL_STATUS: u16 = 0x8218;
    pub const POWER_LEVEL_LAST_GET: u16 = 0x8219;
    pub const POWER_LEVEL_LAST_STATUS: u16 = 0x821A;
    pub const POWER_LEVEL_DEFAULT_GET: u16 = 0x821B;
    pub const POWER_LEVEL_DEFAULT_STATUS: u16 = 0x821C;
    pub const POWER_LEVEL_RANGE_GET: u16 = 0x821D;
    pub const POWER_LEVEL_RANGE_STATUS: u16 = 0x821E;
    pub const POWER_LEVEL_DEFAULT_SET: u16 = 0x821F;
    pub const POWER_LEVEL_DEFAULT_SET_UNACK: u16 = 0x8220;
    pub const POWER_LEVEL_RANGE_SET: u16 = 0x8221;
    pub const POWER_LEVEL_RANGE_SET_UNACK: u16 = 0x8222;

    pub const LOCATION_GLOBAL_GET: u16 = 0x8225;
    pub const LOCATION_GLOBAL_STATUS: u16 = 0x0040;
    pub const LOCATION_LOCAL_GET: u16 = 0x8226;
    pub const LOCATION_LOCAL_STATUS: u16 = 0x8227;
    pub const LOCATION_GLOBAL_SET: u16 = 0x0041;
    pub const LOCATION_GLOBAL_SET_UNACK: u16 = 0x0042;
    pub const LOCATION_LOCAL_SET: u16 = 0x8228;
    pub const LOCATION_LOCAL_SET_UNACK: u16 = 0x8229;

    pub const USER_PROPERTIES_GET: u16 = 0x822E;
    pub const USER_PROPERTIES_STATUS: u16 = 0x004B;
    pub const USER_PROPERTY_GET: u16 = 0x822F;
    pub const USER_PROPERTY_SET: u16 = 0x004C;
    pub const USER_PROPERTY_SET_UNACK: u16 = 0x004D;
    pub const USER_PROPERTY_STATUS: u16 = 0x004E;

    /// All GET-family opcodes; used by `meshx_is_get_req_opcode`'s
    /// generalized form.
    pub const GET_OPCODES: &[u16] = &[
        ONOFF_GET,
        LEVEL_GET,
        ON_POWER_UP_GET,
        POWER_LEVEL_GET,
        POWER_LEVEL_LAST_GET,
        POWER_LEVEL_DEFAULT_GET,
        POWER_LEVEL_RANGE_GET,
        LOCATION_GLOBAL_GET,
        LOCATION_LOCAL_GET,
        USER_PROPERTIES_GET,
        USER_PROPERTY_GET,
    ];

    /// All SET_UNACK-family opcodes; sent via `DIRECT_SEND`, never ACKed.
    pub const UNACK_OPCODES: &[u16] = &[
        ONOFF_SET_UNACK,
        LEVEL_SET_UNACK,
        ON_POWER_UP_SET_UNACK,
        POWER_LEVEL_SET_UNACK,
        POWER_LEVEL_DEFAULT_SET_UNACK,
        POWER_LEVEL_RANGE_SET_UNACK,
        LOCATION_GLOBAL_SET_UNACK,
        LOCATION_LOCAL_SET_UNACK,
        USER_PROPERTY_SET_UNACK,
    ];

    /// All STATUS-family opcodes; the only ones a server is allowed to
    /// emit (spec.md §4.3.2's STATUS allow-list, "Generic status codes
    /// 0x820X/0x82XX").
    pub const STATUS_OPCODES: &[u16] = &[
        ONOFF_STATUS,
        LEVEL_STATUS,
        ON_POWER_UP_STATUS,
        POWER_LEVEL_STATUS,
        POWER_LEVEL_LAST_STATUS,
        POWER_LEVEL_DEFAULT_STATUS,
        POWER_LEVEL_RANGE_STATUS,
        LOCATION_GLOBAL_STATUS,
        LOCATION_LOCAL_STATUS,
        USER_PROPERTIES_STATUS,
        USER_PROPERTY_STATUS,
    ];
}

/// The Generic family's [`ModelFamily`] implementation.
pub struct GenericFamily;

impl ModelFamily for GenericFamily {
    fn family_name() -> &'static str {
        "generic"
    }

    fn validate_client_model_id(model_id: ModelId) -> bool {
        matches!(
            model_id,
            model_id::ONOFF_CLIENT
                | model_id::LEVEL_CLIENT
                | model_id::POWER_ONOFF_CLIENT
                | model_id::POWER_LEVEL_CLIENT
                | model_id::BATTERY_CLIENT
                | model_id::LOCATION_CLIENT
                | model_id::PROPERTY_CLIENT
        )
    }

    fn validate_server_model_id(model_id: ModelId) -> bool {
        matches!(
            model_id,
            model_id::ONOFF_SERVER
                | model_id::LEVEL_SERVER
                | model_id::POWER_ONOFF_SERVER
                | model_id::POWER_ONOFF_SETUP_SERVER
                | model_id::POWER_LEVEL_SERVER
                | model_id::POWER_LEVEL_SETUP_SERVER
                | model_id::BATTERY_SERVER
                | model_id::LOCATION_SERVER
                | model_id::LOCATION_SETUP_SERVER
                | model_id::ADMIN_PROPERTY_SERVER
                | model_id::MANUFACTURER_PROPERTY_SERVER
                | model_id::USER_PROPERTY_SERVER
                | model_id::CLIENT_PROPERTY_SERVER
        )
    }

    fn is_unack_opcode(op: Opcode) -> bool {
        opcode::UNACK_OPCODES.contains(&(op.raw() as u16))
    }

    fn is_get_opcode(op: Opcode) -> bool {
        opcode::GET_OPCODES.contains(&(op.raw() as u16))
    }

    fn is_status_opcode(op: Opcode) -> bool {
        opcode::STATUS_OPCODES.contains(&(op.raw() as u16))
    }

    fn plat_model_init() -> Result<()> {
        Ok(())
    }
}
