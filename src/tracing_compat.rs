//! Optional tracing integration.
//!
//! With the `tracing-integration` feature (on by default) the logging macros
//! are the ones from the [`tracing`] crate. Without it they expand to nothing,
//! so engine code can log unconditionally:
//!
//! ```
//! use pramsync::tracing_compat::warn;
//!
//! warn!(key = 0x40, "implicit mutex created");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[doc(hidden)]
#[macro_export]
macro_rules! __pramsync_log_noop {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing-integration"))]
pub use crate::__pramsync_log_noop as debug;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__pramsync_log_noop as error;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__pramsync_log_noop as info;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__pramsync_log_noop as trace;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__pramsync_log_noop as warn;
