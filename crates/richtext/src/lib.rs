//! Bluesky rich-text post encoding.
//!
//! Turns a [`PostDraft`] into post text plus byte-range [`Facet`]
//! annotations. Pure and deterministic: no I/O, no clock.

mod draft;
mod encoder;
pub mod error;
mod facet;

pub use crate::draft::PostDraft;
pub use crate::encoder::{EncodedPost, EncoderOptions, MAX_POST_BYTES, StargazerPlacement, encode};
pub use crate::facet::{ByteSlice, Facet, Feature, FeatureKind, LINK_NSID, MENTION_NSID, TAG_NSID};
