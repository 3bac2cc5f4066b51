//! Job name <-> snapshot identifier encoding.
//!
//! Job names on a CI server are arbitrary Unicode strings: they may contain
//! slashes (folders), spaces, percent signs or anything else. Snapshot
//! identifiers are used verbatim as file names, so every byte outside the
//! safe set `A-Z a-z 0-9 - _ .` is escaped as `%XX`. `~` is escaped too,
//! so directories written by older mirror tools keep their file names.
//!
//! Only the canonical form produced by [`encode`] is accepted by [`decode`].
//! A name that decodes therefore always re-encodes to the same identifier,
//! which keeps the mapping between files and jobs one-to-one.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

/// Bytes escaped in snapshot identifiers: everything except `-_.` and ASCII alphanumerics.
const SNAPSHOT_ID_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Errors returned when a snapshot identifier cannot be turned back into a job name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A `%` not followed by two hex digits.
    #[error("malformed escape at byte {position} in {id:?}")]
    MalformedEscape {
        /// The identifier being decoded.
        id: String,
        /// Byte offset of the offending `%`.
        position: usize,
    },

    /// The unescaped bytes are not valid UTF-8.
    #[error("identifier {id:?} does not decode to UTF-8")]
    InvalidUtf8 {
        /// The identifier being decoded.
        id: String,
    },

    /// The identifier decodes, but is not what `encode` would have produced.
    #[error("identifier {id:?} is not canonically encoded")]
    NotCanonical {
        /// The identifier being decoded.
        id: String,
    },
}

/// Encode a job name into a filesystem-safe snapshot identifier.
///
/// Deterministic and injective. The result never contains `/`, `%` other than
/// as part of an escape, or any character outside the safe set.
pub fn encode(name: &str) -> String {
    utf8_percent_encode(name, SNAPSHOT_ID_SET).to_string()
}

/// Decode a snapshot identifier back into the job name it was produced from.
///
/// # Errors
///
/// Returns [`DecodeError`] if the identifier holds a malformed escape, does
/// not decode to UTF-8, or is not in canonical form.
pub fn decode(id: &str) -> Result<String, DecodeError> {
    let bytes = id.as_bytes();
    for (position, byte) in bytes.iter().enumerate() {
        if *byte != b'%' {
            continue;
        }
        let well_formed = bytes
            .get(position + 1..position + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(DecodeError::MalformedEscape {
                id: id.to_string(),
                position,
            });
        }
    }

    let name = percent_decode_str(id)
        .decode_utf8()
        .map_err(|_| DecodeError::InvalidUtf8 { id: id.to_string() })?
        .into_owned();

    if encode(&name) != id {
        return Err(DecodeError::NotCanonical { id: id.to_string() });
    }

    Ok(name)
}
