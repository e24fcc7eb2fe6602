//! Summaries computed on the unified annotation table and on expression
//! matrices.

pub mod check;
pub mod embed;
pub mod frequency;
