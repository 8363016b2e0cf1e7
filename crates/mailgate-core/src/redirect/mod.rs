//! Redirect records: short local-part keys that forward to one or more
//! external addresses.

mod model;
mod repository;

pub use model::RedirectRecord;
pub use repository::RedirectRepository;
