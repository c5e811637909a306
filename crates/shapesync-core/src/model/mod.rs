// ── Domain model ──
//
// `RawRecord` is what a source adapter reports; `DeviceRecord` is the
// canonical, merged unit written to the shaping table.

pub mod device;
pub mod raw;

pub use device::{Bandwidth, DeviceRecord, Origin};
pub use raw::{RawRecord, Service};
