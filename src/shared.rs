//! Externally-owned shared variables (model parameters).
//!
//! The graph never touches the contents of a shared variable; it only
//! records the handle's declared type and shape. A [`SharedStore`] mints the
//! handles and keeps them alive across the graphs that reference them.

use crate::node::DataType;
use crate::shape::Shape;
use std::cell::RefCell;
use std::rc::Rc;

/// An identity-bearing handle to an externally-owned tensor.
#[derive(Debug)]
pub struct SharedVariable {
    /// Store-unique id of this variable.
    pub id: usize,
    /// Human-readable name.
    pub name: String,
    /// Declared storage type.
    pub data_type: DataType,
    /// Declared shape. Shared variables must have fully static shapes.
    pub shape: Shape,
}

/// Reference-counted alias for a shared variable handle.
pub type SharedVar = Rc<SharedVariable>;

/// Mints and owns [`SharedVariable`] handles.
#[derive(Debug, Default)]
pub struct SharedStore {
    vars: RefCell<Vec<SharedVar>>,
}

impl SharedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new shared variable and registers it with the store.
    pub fn make(&self, name: &str, data_type: DataType, shape: Shape) -> SharedVar {
        let mut vars = self.vars.borrow_mut();
        let var = Rc::new(SharedVariable {
            id: vars.len(),
            name: name.to_owned(),
            data_type,
            shape,
        });
        log::debug!(
            target: "symgrad::shared",
            "registered shared variable {} '{}' of shape {}",
            var.id,
            var.name,
            var.shape
        );
        vars.push(Rc::clone(&var));
        var
    }

    /// Number of variables minted so far.
    pub fn len(&self) -> usize {
        self.vars.borrow().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.borrow().is_empty()
    }

    /// Returns the variable with the given store id, if any.
    pub fn get(&self, id: usize) -> Option<SharedVar> {
        self.vars.borrow().get(id).map(Rc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_assigns_sequential_ids() {
        let store = SharedStore::new();
        let w = store.make("w", DataType::Float32, Shape::matrix(3, 4));
        let b = store.make("b", DataType::Float32, Shape::vector(3));
        assert_eq!(w.id, 0);
        assert_eq!(b.id, 1);
        assert_eq!(store.len(), 2);
        assert!(Rc::ptr_eq(&store.get(1).unwrap(), &b));
    }
}
