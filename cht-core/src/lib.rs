#![doc = "cht-core: streaming conversion core for cht."]

//! This crate holds every part of the conversion pipeline that does not
//! touch the command line: resolving paths into sources, selecting files
//! from directories, lazily streaming decoded records, folding snapshots
//! with updates, and writing CSV or JSON.
//!
//! # Usage
//! The CLI crate builds a [`pipeline::SnapshotRequest`] or
//! [`pipeline::TransformRequest`] and hands it, with a
//! [`product::ProductCatalog`], to the functions in [`pipeline`].

pub mod combine;
pub mod contract;
pub mod decode;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod product;
pub mod reader;
pub mod resolve;
pub mod selection;

pub use error::{ConvertError, Result};
