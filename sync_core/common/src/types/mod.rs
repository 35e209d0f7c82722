pub mod field_path;
pub mod json_type;
pub mod stream_key;

pub use field_path::FieldPath;
pub use json_type::JsonType;
pub use stream_key::StreamKey;
