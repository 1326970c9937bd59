//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a whole [`bspcore::Runtime`]
//! against the mock board.  All tests run on the host with no real
//! hardware required.

mod mock_hw;
mod runtime_tests;
mod serial_tests;
