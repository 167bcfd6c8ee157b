//! `ModelFamily`: the single trait that replaces the original's CRTP
//! client/server base-class hierarchy (spec.md §9's "heterogeneous
//! template base classes" note). A concrete family (Generic, Light)
//! implements model-id validation and opcode classification once;
//! [`super::client::ClientRegistry`] and [`super::server::ServerRegistry`]
//! are generic over it instead of being duplicated per family.

use crate::error::Result;
use crate::types::{ModelId, Opcode};

/// Classification and validation rules shared by every model belonging
/// to one family (Generic OnOff/Level/Power/Location/Property, or
/// Light CTL/Lightness/HSL/xyL/LC).
pub trait ModelFamily: Send + Sync + 'static {
    /// Human-readable family name, used only in logging.
    fn family_name() -> &'static str;

    /// Is `model_id` a client model this family recognizes?
    fn validate_client_model_id(model_id: ModelId) -> bool;

    /// Is `model_id` a server model this family recognizes?
    fn validate_server_model_id(model_id: ModelId) -> bool;

    /// Does `opcode` belong to the family's SET_UNACK-style group (sent
    /// directly, no ACK ever expected)?
    fn is_unack_opcode(opcode: Opcode) -> bool;

    /// Does `opcode` belong to the family's GET group?
    fn is_get_opcode(opcode: Opcode) -> bool;

    /// Does `opcode` belong to the family's STATUS group (the only
    /// opcodes a server is allowed to emit)?
    fn is_status_opcode(opcode: Opcode) -> bool;

    /// Per-family one-time platform hook, invoked the first time any
    /// model in the family is constructed (spec.md §4.3's
    /// sentinel-protected `plat_model_init`). Most families need none.
    fn plat_model_init() -> Result<()> {
        Ok(())
    }
}
