//! Named-sequence allocation and certificate identifier formatting.

mod allocator;
mod identifier;

pub use allocator::{validate_key, CounterAllocator, MAX_KEY_LEN};
pub use identifier::{
    format_identifier, IdentifierParseError, IssuedIdentifier, IDENTIFIER_TAG, SEQUENCE_WIDTH,
};
