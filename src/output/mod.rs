//! Output processing.
//!
//! - Decoding raw interpreter bytes into text
//! - Bounding text returned to the caller
//!
//! # Example
//!
//! ```
//! use shell_relay::output::{OutputCodec, Trimmer};
//!
//! // UTF-16LE with a byte-order mark, as wide-character shells emit it
//! let raw = b"\xff\xfeo\x00k\x00";
//! assert_eq!(OutputCodec::decode(raw), "ok");
//!
//! let trimmed = Trimmer::trim("abcdef", 3);
//! assert_eq!(trimmed, "abc\n...[trimmed 3 chars]");
//! ```

mod codec;
mod trim;

pub use codec::OutputCodec;
pub use trim::Trimmer;
