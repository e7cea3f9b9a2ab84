pub use self::cancel::{CancelToken, Cancelled};
pub use self::errors::DepsolveResult;

pub mod cancel;
pub mod errors;
