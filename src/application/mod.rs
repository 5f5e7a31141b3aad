//! Application layer: compilation, the renderer protocol and the session
//! state machines that drive it.

pub mod codec;
pub mod compiler;
pub mod error;
pub mod lifecycle;
pub mod runtime;
pub mod scripts;
pub mod session;
