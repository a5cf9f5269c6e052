//! Provider Response Validation
//!
//! Turns raw model text into JSON values with a defined failure mode.
//! Callers map `ExtractError` onto `ForgeError::MalformedResponse`.

mod json_extract;

pub use json_extract::{
    ExtractError, JsonShape, extract_json, extract_json_shaped, optional_str, required_str,
};
