//! Utility functions for utkik.
//!
//! - [`text`]: string helpers used when deriving names.

pub mod text;
