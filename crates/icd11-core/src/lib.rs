pub mod ancestor;
pub mod code;
pub mod entity;
pub mod error;
pub mod text;
pub mod uri;

pub use ancestor::{Ancestor, parent_items};
pub use code::{CodeMatch, classify, code_of, matches_exact, matches_prefix, normalize_code};
pub use entity::{Entity, EntityRefs, fields, is_meaningful};
pub use error::{ErrorCategory, Icd11Error, Result};
pub use text::{strip_markup, text_of};
