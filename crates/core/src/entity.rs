//! Entity trait: catalog and bookkeeping records with identity but no
//! status machine of their own.

pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
