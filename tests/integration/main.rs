//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

use critical_section as _;

mod ignition_flow_tests;
mod mock_hw;
mod settings_store_tests;
mod sleep_tests;
