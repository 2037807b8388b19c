//! Export and serialization: encoded downloads of the composite or individual layers, and the
//! project snapshot format.

pub mod encode;
pub mod exporter;
pub mod options;
pub mod project;
pub mod sink;
