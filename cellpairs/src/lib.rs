#![warn(clippy::all, clippy::pedantic)]

// disable some style lints
#![allow(clippy::needless_return, clippy::must_use_candidate, clippy::comparison_chain)]
#![allow(clippy::redundant_field_names, clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unreadable_literal, clippy::option_if_let_else, clippy::range_plus_one)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::module_name_repetitions)]

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap, clippy::cast_lossless, clippy::cast_sign_loss)]
#![allow(clippy::default_trait_access, clippy::too_many_arguments)]

// Tests lints
#![cfg_attr(test, allow(clippy::float_cmp))]

mod errors;
pub use self::errors::Error;

mod types;
pub use self::types::Vector3D;

mod geometry;
pub use self::geometry::{BoxGeometry, Shear};

pub mod neighbors;
pub use self::neighbors::{CellRange, NeighborOffsetList};

pub mod cells;
pub use self::cells::{Cell, CellEnergy, CellGradient, CELL_CAPACITY};

pub mod group;

pub mod reduce;
pub use self::reduce::LaunchConfig;

pub mod sort;
pub use self::sort::{OverflowPolicy, SortReport};

pub mod potentials;

mod grid;
pub use self::grid::{CellGrid, CellSummary, GridParameters};

#[cfg(test)]
pub(crate) mod test_utils;
