mod closure;
mod error;
mod multipart;
mod net;
mod push;

pub use closure::{Closure, ClosureBuilder};
pub use error::ClientErr;
pub use net::PushClient;
pub use push::{push, PushOutcome};
