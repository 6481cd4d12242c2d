//! Typed facades for specific target applications.

pub mod devonthink;
