// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// A rendering error.
///
/// All variants are fatal: they unwind the whole `render` call and no
/// pixels are committed to the caller's buffer. Recoverable conditions
/// (a missing `use` target, an external reference, a malformed
/// attribute value) are logged and rendering continues.
#[derive(Debug)]
pub enum Error {
    /// A chain of references (`use`, `mask`, `marker`, `clip-path`)
    /// returned to an already visited element.
    CyclicReference,

    /// An IRI paint without a fallback did not resolve to a paint server.
    MissingPaintServer(String),

    /// The element referenced by a `mask` attribute does not exist
    /// or is not a `mask` element.
    MissingMask(String),

    /// The document's root element is not `svg`.
    NotAnSvg,

    /// The root viewport has a zero or negative size.
    InvalidSize,

    /// Failed to parse an SVG data.
    ParsingFailed(roxmltree::Error),

    /// A render buffer could not be allocated, usually because the
    /// viewport is absurdly large.
    LayerAllocationFailed,
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::ParsingFailed(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Error::CyclicReference => {
                write!(f, "Cyclic reference found")
            }
            Error::MissingPaintServer(ref id) => {
                write!(f, "Can't find paint server '#{}'", id)
            }
            Error::MissingMask(ref id) => {
                write!(f, "Element referenced by 'mask' not found: '#{}'", id)
            }
            Error::NotAnSvg => {
                write!(f, "the root element is not an 'svg' element")
            }
            Error::InvalidSize => {
                write!(f, "SVG has an invalid size")
            }
            Error::ParsingFailed(ref e) => {
                write!(f, "SVG data parsing failed cause {}", e)
            }
            Error::LayerAllocationFailed => {
                write!(f, "failed to allocate a render buffer")
            }
        }
    }
}

impl std::error::Error for Error {}
