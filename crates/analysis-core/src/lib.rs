pub mod calendar;
pub mod cancel;
pub mod error;
pub mod returns;
pub mod stats;
pub mod traits;
pub mod types;

pub use calendar::*;
pub use cancel::*;
pub use error::*;
pub use returns::*;
pub use traits::*;
pub use types::*;
