//! Records and the field-selective codec applied to them

mod codec;
mod kinds;
mod types;

pub use codec::{decode as decode_record, encode as encode_record};
pub use kinds::RecordKind;
pub use types::*;
