pub mod record_codec;
pub mod timestamp;

pub use record_codec::{DecodeError, decode, decode_any, encode, encode_line};
pub use timestamp::{format_timestamp, parse_time_arg, parse_timestamp};
