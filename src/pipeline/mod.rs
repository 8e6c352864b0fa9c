//! Label verification pipeline — stateless and pure.
//!
//! Every stage is a function of its inputs: normalize → extract → match →
//! validate. No stage holds mutable state, so one pipeline is safely shared
//! across concurrent capture sessions; only session state is per-session.

pub mod extract;
pub mod lexicon;
pub mod matcher;
pub mod normalize;
pub mod validate;

pub use extract::extract;
pub use matcher::match_field;
pub use normalize::{normalize, sanitize};
pub use validate::validate;
