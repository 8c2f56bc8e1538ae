//! Build a pinned OpenFst release and package its shared libraries as a
//! relocatable Python extension.
//!
//! The stages live in [`builder`]; [`builder::Pipeline`] runs them in order.

pub mod builder;
