pub mod event_calls;
pub mod fs_calls;
pub mod net_calls;

pub use event_calls::*;
pub use fs_calls::*;
pub use net_calls::*;
