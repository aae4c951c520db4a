//! Pipeline stages: normalization, spatial indexing, clustering, extraction.

pub mod clustering;
pub mod extract;
pub mod index;
pub mod normalize;
