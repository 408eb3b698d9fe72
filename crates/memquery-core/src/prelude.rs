//! Convenient re-exports for downstream crates.

pub use crate::config::{EngineConfig, EquiJoinStrategy};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::manifest::RunManifest;
pub use crate::relation::{MaterializedRelation, Relation, RowIter, SortedRelation, StreamingRelation};
pub use crate::row::{Row, RowBuilder};
pub use crate::schema::{Accessor, DataType, Field, Schema, SchemaRef};
pub use crate::sort::{RowComparator, SortOrder};
pub use crate::types::Scalar;
