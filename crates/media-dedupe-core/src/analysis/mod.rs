pub mod grouping;
pub mod representative;
pub mod scope;
pub mod similarity;
pub mod union_find;
