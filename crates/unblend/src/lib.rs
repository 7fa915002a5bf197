//! Alpha Reconstruction - Recover transparency from two opaque captures
//!
//! Given the same frame composited once over white and once over black,
//! inverts the source-over operator to get back straight RGBA:
//!
//! ```text
//! light = C·a + 255·(1 - a)
//! dark  = C·a
//! ```
//!
//! so `a = 1 - (light - dark) / 255` and `C = (light - 255·(1 - a)) / a`.

mod error;
mod reconstruct;

pub use error::*;
pub use reconstruct::*;
