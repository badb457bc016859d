/*!
# Collector DevKit - stubs and helpers for testing collection runs

- Scripted device drivers, no real equipment needed
- Capturing sink instead of stdout or a write endpoint
- Inventory fixtures written as YAML to a temp directory
- Harness running the whole orchestrator in-process
*/

pub mod capture_sink;
pub mod device_stub;
pub mod fixtures;
pub mod test_utils;

pub use capture_sink::CaptureSink;
pub use device_stub::{ScriptedDevice, ScriptedFleet};
pub use fixtures::InventoryFixture;
pub use test_utils::{RunOutcome, TestHarness};
