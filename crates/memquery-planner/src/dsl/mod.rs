//! Text front-ends that produce `Query` values.

pub mod yaml;
