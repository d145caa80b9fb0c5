//! Copy-on-write builder protocol.
//!
//! Builder methods on statements and selectables are generative: they copy the
//! receiver's payload, apply the change to the copy and return a new node whose
//! clone ancestry points back at the receiver. The receiver is never touched.
//!
//! The in-place form ([`Generative::mutate_in_place`]) only succeeds while the
//! node is uniquely owned and nothing has derived collections from it yet; a
//! published node is rejected with an invalid-request error.

use crate::error::{SqlError, SqlResult};
use crate::node::{Element, NodeKind};
use std::sync::Arc;

/// A typed view over a node whose payload can be copied and amended.
pub trait Generative: Sized {
    /// Payload type held by the node.
    type Data: Clone;

    fn element(&self) -> &Element;

    fn element_mut(&mut self) -> &mut Element;

    /// Wrap an element already known to carry `Self::Data`.
    fn from_element(element: Element) -> Self;

    fn project(kind: &NodeKind) -> Option<&Self::Data>;

    fn project_mut(kind: &mut NodeKind) -> Option<&mut Self::Data>;

    fn embed(data: Self::Data) -> NodeKind;

    /// Copy of the receiver with `f` applied to its payload.
    fn generate(&self, f: impl FnOnce(&mut Self::Data)) -> Self {
        let mut data = match Self::project(self.element().kind()) {
            Some(d) => d.clone(),
            None => unreachable!("typed wrapper over a foreign node kind"),
        };
        f(&mut data);
        Self::from_element(self.element().derive(Self::embed(data)))
    }

    /// Fallible form of [`generate`](Self::generate); the receiver is unaffected on error.
    fn try_generate(&self, f: impl FnOnce(&mut Self::Data) -> SqlResult<()>) -> SqlResult<Self> {
        let mut data = match Self::project(self.element().kind()) {
            Some(d) => d.clone(),
            None => unreachable!("typed wrapper over a foreign node kind"),
        };
        f(&mut data)?;
        Ok(Self::from_element(self.element().derive(Self::embed(data))))
    }

    /// Apply `f` to the payload in place.
    ///
    /// Fails when the node is shared with any other holder, including columns
    /// or clones derived from it.
    fn mutate_in_place(&mut self, f: impl FnOnce(&mut Self::Data) -> SqlResult<()>) -> SqlResult<()> {
        let node = Arc::get_mut(&mut self.element_mut().0).ok_or_else(|| {
            SqlError::invalid_request(
                "Cannot mutate a construct in place once it is shared; use the generative form",
            )
        })?;
        let data = match Self::project_mut(&mut node.kind) {
            Some(d) => d,
            None => unreachable!("typed wrapper over a foreign node kind"),
        };
        f(data)?;
        node.memo = Default::default();
        Ok(())
    }
}

/// Declare a typed wrapper around [`Element`] for one node kind.
macro_rules! node_wrapper {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $data:ty) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) $crate::node::Element);

        impl $name {
            pub fn element(&self) -> &$crate::node::Element {
                &self.0
            }

            pub fn into_element(self) -> $crate::node::Element {
                self.0
            }

            pub(crate) fn data(&self) -> &$data {
                match self.0.kind() {
                    $crate::node::NodeKind::$variant(d) => d,
                    _ => unreachable!(concat!(stringify!($name), " over a foreign node kind")),
                }
            }
        }

        impl $crate::generative::Generative for $name {
            type Data = $data;

            fn element(&self) -> &$crate::node::Element {
                &self.0
            }

            fn element_mut(&mut self) -> &mut $crate::node::Element {
                &mut self.0
            }

            fn from_element(element: $crate::node::Element) -> Self {
                $name(element)
            }

            fn project(kind: &$crate::node::NodeKind) -> Option<&$data> {
                match kind {
                    $crate::node::NodeKind::$variant(d) => Some(d),
                    _ => None,
                }
            }

            fn project_mut(kind: &mut $crate::node::NodeKind) -> Option<&mut $data> {
                match kind {
                    $crate::node::NodeKind::$variant(d) => Some(d),
                    _ => None,
                }
            }

            fn embed(data: $data) -> $crate::node::NodeKind {
                $crate::node::NodeKind::$variant(data)
            }
        }

        impl From<$name> for $crate::node::Element {
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl From<&$name> for $crate::node::Element {
            fn from(v: &$name) -> Self {
                v.0.clone()
            }
        }

        impl AsRef<$crate::node::Element> for $name {
            fn as_ref(&self) -> &$crate::node::Element {
                &self.0
            }
        }

        impl TryFrom<$crate::node::Element> for $name {
            type Error = $crate::error::SqlError;

            fn try_from(element: $crate::node::Element) -> Result<Self, Self::Error> {
                match element.kind() {
                    $crate::node::NodeKind::$variant(_) => Ok($name(element)),
                    _ => Err($crate::error::SqlError::argument(format!(
                        "expected {}, got {}",
                        stringify!($name),
                        element.type_name()
                    ))),
                }
            }
        }
    };
}

pub(crate) use node_wrapper;
