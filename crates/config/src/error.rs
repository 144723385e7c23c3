pub use chatmux_common::{Error, Result};

chatmux_common::impl_context!();
