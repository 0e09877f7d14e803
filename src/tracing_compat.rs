//! Optional tracing integration.
//!
//! With the `tracing-integration` feature enabled, the macros re-exported
//! here are the `tracing` crate's event macros. Without it they expand to
//! nothing, so call sites cost nothing and need no `cfg` of their own.
//!
//! ```ignore
//! use crate::tracing_compat::debug;
//!
//! debug!(opcode = ?frame.opcode, len = frame.payload.len(), "frame decoded");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __hybi_tracing_noop {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing-integration"))]
pub use crate::__hybi_tracing_noop as debug;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__hybi_tracing_noop as error;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__hybi_tracing_noop as info;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__hybi_tracing_noop as trace;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__hybi_tracing_noop as warn;
