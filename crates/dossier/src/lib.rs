//! `dossier`: fluent query-builder facade over `dossier-core`.

mod symbol;

pub use symbol::{Symbol, SymbolicAttribute};

pub mod prelude {
    pub use crate::{Symbol, SymbolicAttribute};
    pub use dossier_core::prelude::*;
}
