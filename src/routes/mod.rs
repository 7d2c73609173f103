//! Router Module Index
//!
//! Splits the API by access level. The admin gate is applied as a layer on the
//! admin router itself, so a protected endpoint cannot be mounted without it.

/// Routes accessible to anonymous visitors: menu browsing and submission intake.
pub mod public;

/// Routes behind the bearer-token access gate (plus the ungated login).
pub mod admin;
