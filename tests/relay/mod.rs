//! Transport and relay tests.

mod pipeline_tests;
mod transport_tests;
