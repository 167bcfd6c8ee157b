//! Element composition helpers (external collaborator; spec.md §1, §3).
//!
//! The original builds its composition table at compile time via
//! per-element macros (`RELAY_SRV_MODEL(_n, _pin)` in the deprecated
//! relay-switch element) that each expand to a fixed array of BLE Mesh
//! SIG model structs. `meshx` replaces the macro-generated array with an
//! owned, runtime-built [`Composition`]: [`ModelRef`] values are still
//! created once, at composition time, and never destroyed during
//! operation (spec.md §3's Model Reference lifecycle) — only the
//! mechanism for building the table changes.

use std::collections::HashMap;

use crate::error::{MeshxError, Result};
use crate::types::{Address, ModelId, ModelRef, TransportHandle};

/// One element in the composition: a fixed element index, its unicast
/// address (assigned by the provisioner at provisioning time; `None`
/// before provisioning), and the models it carries.
pub struct Element {
    pub index: u8,
    pub address: Option<Address>,
    models: HashMap<ModelId, ModelRef>,
}

impl Element {
    pub fn new(index: u8) -> Self {
        Self { index, address: None, models: HashMap::new() }
    }

    /// Compose `model_id` into this element. Fails with
    /// [`MeshxError::InvalidArg`] if the element already carries a model
    /// with that id (each `(element_index, model_id)` pair is unique,
    /// spec.md §3's Model Reference definition).
    pub fn add_model(&mut self, model_id: ModelId, pub_addr: Address, transport_handle: TransportHandle) -> Result<ModelRef> {
        if self.models.contains_key(&model_id) {
            return Err(MeshxError::InvalidArg);
        }
        let model_ref = ModelRef { element_index: self.index, model_id, pub_addr, transport_handle };
        self.models.insert(model_id, model_ref);
        Ok(model_ref)
    }

    pub fn model(&self, model_id: ModelId) -> Option<ModelRef> {
        self.models.get(&model_id).copied()
    }

    pub fn model_ids(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.models.keys().copied()
    }
}

/// The node's full element composition, built once at startup and
/// static thereafter (spec.md §3: "destroyed never during operation —
/// composition is static after provisioning").
#[derive(Default)]
pub struct Composition {
    elements: Vec<Element>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new element, returning its assigned index. Elements are
    /// always appended in order; there is no element removal API,
    /// matching the original's static composition table.
    pub fn add_element(&mut self) -> u8 {
        let index = self.elements.len() as u8;
        self.elements.push(Element::new(index));
        index
    }

    pub fn element(&self, index: u8) -> Option<&Element> {
        self.elements.get(index as usize)
    }

    pub fn element_mut(&mut self, index: u8) -> Option<&mut Element> {
        self.elements.get_mut(index as usize)
    }

    /// Find the `(element_index, model_id)` pair for `model_id`,
    /// scanning elements in composition order (mirrors how the original
    /// resolves `el_id` from a bare model pointer at dispatch time).
    pub fn find_model(&self, model_id: ModelId) -> Option<ModelRef> {
        self.elements.iter().find_map(|el| el.model(model_id))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The node's primary element address — the unicast address of
    /// element 0, assigned at provisioning (spec.md §6.1's
    /// `plat_get_primary_element_address`, modeled here as a pure
    /// lookup rather than a transport round-trip since `meshx` owns the
    /// composition table).
    pub fn primary_element_address(&self) -> Option<Address> {
        self.elements.first().and_then(|el| el.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_model_rejects_duplicate_model_id_on_same_element() {
        let mut comp = Composition::new();
        let idx = comp.add_element();
        let el = comp.element_mut(idx).unwrap();

        el.add_model(ModelId::new(0x1000), Address(0x0001), TransportHandle(1)).unwrap();
        let err = el.add_model(ModelId::new(0x1000), Address(0x0001), TransportHandle(2)).unwrap_err();
        assert_eq!(err, MeshxError::InvalidArg);
    }

    #[test]
    fn find_model_scans_all_elements() {
        let mut comp = Composition::new();
        let e0 = comp.add_element();
        let e1 = comp.add_element();
        comp.element_mut(e0).unwrap().add_model(ModelId::new(0x1000), Address(0x0001), TransportHandle(1)).unwrap();
        comp.element_mut(e1).unwrap().add_model(ModelId::new(0x1303), Address(0x0002), TransportHandle(2)).unwrap();

        let found = comp.find_model(ModelId::new(0x1303)).unwrap();
        assert_eq!(found.element_index, 1);
    }

    #[test]
    fn primary_element_address_is_element_zero() {
        let mut comp = Composition::new();
        let idx = comp.add_element();
        comp.element_mut(idx).unwrap().address = Some(Address(0x0003));
        assert_eq!(comp.primary_element_address(), Some(Address(0x0003)));
    }
}
