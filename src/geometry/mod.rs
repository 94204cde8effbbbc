//! Reference-cell combinatorics and face-orientation bookkeeping.
//!
//! Everything in here is dimension-parameterized pure index arithmetic: the
//! local numbering of vertices, faces, edges and children of a line/quad/hex
//! cell, and the small permutations relating the face frames of two adjacent
//! cells. No geometry module function touches mesh storage.

pub mod orientation;
pub mod reference;

pub use orientation::FacePerm;
pub use reference::ReferenceCell;
