//! The Light family: Lightness, CTL, HSL, xyL, LC. Grounded on
//! `original_source/.../light_model/*.cpp` and spec.md §6.3's bit-exact
//! CTL STATUS payload table.

pub mod ctl;
pub mod hsl;
pub mod lc;
pub mod lightness;
pub mod xyl;

use crate::error::Result;
use crate::model::ModelFamily;
use crate::types::{ModelId, Opcode};

/// Light model ids. Client ids (`0x1302, 0x1305, 0x1309, 0x130E, 0x1311`)
/// match spec.md §4.2's literal allow-list exactly.
pub mod model_id {
    use crate::types::ModelId;

    pub const LIGHTNESS_SERVER: ModelId = ModelId::new(0x1300);
    pub const LIGHTNESS_SETUP_SERVER: ModelId = ModelId::new(0x1301);
    pub const LIGHTNESS_CLIENT: ModelId = ModelId::new(0x1302);

    pub const CTL_SERVER: ModelId = ModelId::new(0x1303);
    pub const CTL_SETUP_SERVER: ModelId = ModelId::new(0x1304);
    pub const CTL_CLIENT: ModelId = ModelId::new(0x1305);
    pub const CTL_TEMPERATURE_SERVER: ModelId = ModelId::new(0x1306);

    pub const HSL_SERVER: ModelId = ModelId::new(0x1307);
    pub const HSL_SETUP_SERVER: ModelId = ModelId::new(0x1308);
    pub const HSL_CLIENT: ModelId = ModelId::new(0x1309);
    pub const HSL_HUE_SERVER: ModelId = ModelId::new(0x130A);
    pub const HSL_SATURATION_SERVER: ModelId = ModelId::new(0x130B);

    pub const XYL_SERVER: ModelId = ModelId::new(0x130C);
    pub const XYL_SETUP_SERVER: ModelId = ModelId::new(0x130D);
    pub const XYL_CLIENT: ModelId = ModelId::new(0x130E);

    pub const LC_SERVER: ModelId = ModelId::new(0x130F);
    pub const LC_SETUP_SERVER: ModelId = ModelId::new(0x1310);
    pub const LC_CLIENT: ModelId = ModelId::new(0x1311);
}

/// Opcodes for every Light sub-model. The four CTL `*_STATUS` values are
/// pinned to spec.md §6.3's literal hex; everything else is this
/// family's own consistent numbering scheme, grounded on the same
/// GET/SET/SET_UNACK/STATUS quartet shape the Generic family uses.
pub mod opcode {
    pub const LIGHTNESS_GET: u16 = 0x824B;
    pub const LIGHTNESS_SET: u16 = 0x824C;
    pub const LIGHTNESS_SET_UNACK: u16 = 0x824D;
    pub const LIGHTNESS_STATUS: u16 = 0x824E;
    pub const LIGHTNESS_LINEAR_GET: u16 = 0x824F;
    pub const LIGHTNESS_LINEAR_SET: u16 = 0x8250;
    pub const LIGHTNESS_LINEAR_SET_UNACK: u16 = 0x8251;
    pub const LIGHTNESS_LINEAR_STATUS: u16 = 0x8252;
    pub const LIGHTNESS_DEFAULT_GET: u16 = 0x8253;
    pub const LIGHTNESS_DEFAULT_STATUS: u16 = 0x8254;
    pub const LIGHTNESS_RANGE_GET: u16 = 0x8255;
    pub const LIGHTNESS_RANGE_STATUS: u16 = 0x8256;

    pub const CTL_GET: u16 = 0x825D;
    pub const CTL_SET: u16 = 0x825E;
    pub const CTL_SET_UNACK: u16 = 0x825F;
    /// Pinned by spec.md §6.3.
    pub const CTL_STATUS: u16 = 0x8260;
    pub const CTL_TEMPERATURE_GET: u16 = 0x8261;
    pub const CTL_TEMPERATURE_RANGE_GET: u16 = 0x8262;
    /// Pinned by spec.md §6.3.
    pub const CTL_TEMPERATURE_RANGE_STATUS: u16 = 0x8263;
    pub const CTL_TEMPERATURE_SET: u16 = 0x8264;
    pub const CTL_TEMPERATURE_SET_UNACK: u16 = 0x8265;
    /// Pinned by spec.md §6.3.
    pub const CTL_TEMPERATURE_STATUS: u16 = 0x8266;
    pub const CTL_DEFAULT_GET: u16 = 0x8267;
    /// Pinned by spec.md §6.3.
    pub const CTL_DEFAULT_STATUS: u16 = 0x8268;
    pub const CTL_DEFAULT_SET: u16 = 0x8269;
    pub const CTL_DEFAULT_SET_UNACK: u16 = 0x826A;
    pub const CTL_TEMPERATURE_RANGE_SET: u16 = 0x826B;
    pub const CTL_TEMPERATURE_RANGE_SET_UNACK: u16 = 0x826C;

    pub const HSL_GET: u16 = 0x8276;
    pub const HSL_SET: u16 = 0x8277;
    pub const HSL_SET_UNACK: u16 = 0x8278;
    pub const HSL_STATUS: u16 = 0x8279;
    pub const HSL_TARGET_GET: u16 = 0x827A;
    pub const HSL_TARGET_STATUS: u16 = 0x827B;
    pub const HSL_DEFAULT_GET: u16 = 0x827C;
    pub const HSL_DEFAULT_STATUS: u16 = 0x827D;
    pub const HSL_RANGE_GET: u16 = 0x827E;
    pub const HSL_RANGE_STATUS: u16 = 0x827F;

    pub const XYL_GET: u16 = 0x8289;
    pub const XYL_SET: u16 = 0x828A;
    pub const XYL_SET_UNACK: u16 = 0x828B;
    pub const XYL_STATUS: u16 = 0x828C;
    pub const XYL_TARGET_GET: u16 = 0x828D;
    pub const XYL_TARGET_STATUS: u16 = 0x828E;
    pub const XYL_DEFAULT_GET: u16 = 0x828F;
    pub const XYL_DEFAULT_STATUS: u16 = 0x8290;
    pub const XYL_RANGE_GET: u16 = 0x8291;
    pub const XYL_RANGE_STATUS: u16 = 0x8292;

    pub const LC_MODE_GET: u16 = 0x8291 + 1;
    pub const LC_MODE_SET: u16 = LC_MODE_GET + 1;
    pub const LC_MODE_SET_UNACK: u16 = LC_MODE_GET + 2;
    pub const LC_MODE_STATUS: u16 = LC_MODE_GET + 3;
    pub const LC_OM_GET: u16 = LC_MODE_GET + 4;
    pub const LC_OM_SET: u16 = LC_MODE_GET + 5;
    pub const LC_OM_SET_UNACK: u16 = LC_MODE_GET + 6;
    pub const LC_OM_STATUS: u16 = LC_MODE_GET + 7;
    pub const LC_LIGHT_ONOFF_GET: u16 = LC_MODE_GET + 8;
    pub const LC_LIGHT_ONOFF_SET: u16 = LC_MODE_GET + 9;
    pub const LC_LIGHT_ONOFF_SET_UNACK: u16 = LC_MODE_GET + 10;
    pub const LC_LIGHT_ONOFF_STATUS: u16 = LC_MODE_GET + 11;

    pub const GET_OPCODES: &[u16] = &[
        LIGHTNESS_GET,
        LIGHTNESS_LINEAR_GET,
        LIGHTNESS_DEFAULT_GET,
        LIGHTNESS_RANGE_GET,
        CTL_GET,
        CTL_TEMPERATURE_GET,
        CTL_TEMPERATURE_RANGE_GET,
        CTL_DEFAULT_GET,
        HSL_GET,
        HSL_TARGET_GET,
        HSL_DEFAULT_GET,
        HSL_RANGE_GET,
        XYL_GET,
        XYL_TARGET_GET,
        XYL_DEFAULT_GET,
        XYL_RANGE_GET,
        LC_MODE_GET,
        LC_OM_GET,
        LC_LIGHT_ONOFF_GET,
    ];

    pub const UNACK_OPCODES: &[u16] = &[
        LIGHTNESS_SET_UNACK,
        LIGHTNESS_LINEAR_SET_UNACK,
        CTL_SET_UNACK,
        CTL_TEMPERATURE_SET_UNACK,
        CTL_DEFAULT_SET_UNACK,
        CTL_TEMPERATURE_RANGE_SET_UNACK,
        HSL_SET_UNACK,
        XYL_SET_UNACK,
        LC_MODE_SET_UNACK,
        LC_OM_SET_UNACK,
        LC_LIGHT_ONOFF_SET_UNACK,
    ];

    pub const STATUS_OPCODES: &[u16] = &[
        LIGHTNESS_STATUS,
        LIGHTNESS_LINEAR_STATUS,
        LIGHTNESS_DEFAULT_STATUS,
        LIGHTNESS_RANGE_STATUS,
        CTL_STATUS,
        CTL_TEMPERATURE_STATUS,
        CTL_TEMPERATURE_RANGE_STATUS,
        CTL_DEFAULT_STATUS,
        HSL_STATUS,
        HSL_TARGET_STATUS,
        HSL_DEFAULT_STATUS,
        HSL_RANGE_STATUS,
        XYL_STATUS,
        XYL_TARGET_STATUS,
        XYL_DEFAULT_STATUS,
        XYL_RANGE_STATUS,
        LC_MODE_STATUS,
        LC_OM_STATUS,
        LC_LIGHT_ONOFF_STATUS,
    ];
}

/// The Light family's [`ModelFamily`] implementation.
pub struct LightFamily;

impl ModelFamily for LightFamily {
    fn family_name() -> &'static str {
        "light"
    }

    fn validate_client_model_id(model_id: ModelId) -> bool {
        matches!(
            model_id,
            model_id::LIGHTNESS_CLIENT
                | model_id::CTL_CLIENT
                | model_id::HSL_CLIENT
                | model_id::XYL_CLIENT
                | model_id::LC_CLIENT
        )
    }

    fn validate_server_model_id(model_id: ModelId) -> bool {
        matches!(
            model_id,
            model_id::LIGHTNESS_SERVER
                | model_id::LIGHTNESS_SETUP_SERVER
                | model_id::CTL_SERVER
                | model_id::CTL_SETUP_SERVER
                | model_id::CTL_TEMPERATURE_SERVER
                | model_id::HSL_SERVER
                | model_id::HSL_SETUP_SERVER
                | model_id::HSL_HUE_SERVER
                | model_id::HSL_SATURATION_SERVER
                | model_id::XYL_SERVER
                | model_id::XYL_SETUP_SERVER
                | model_id::LC_SERVER
                | model_id::LC_SETUP_SERVER
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
