//! HTTP adapters for the candidate engine
//!
//! Concrete generators, verifiers, expanders and lookups:
//! - `resources`: model-suggested study links, verified by `HEAD`
//! - `scholarships`: batch matches checked for deadline and live link
//! - `avatars`: generated letter images judged by a vision model
//! - `places`: expanded geocoder search over Nominatim

pub mod avatars;
pub mod chat;
pub mod error;
pub mod http;
pub mod link_check;
pub mod parse;
pub mod places;
pub mod resources;
pub mod scholarships;

pub use avatars::{Avatar, AvatarGenerator, AvatarJudge, AvatarRequest};
pub use chat::{ChatClient, LlmConfig};
pub use error::{AdapterError, Result};
pub use link_check::LinkVerifier;
pub use places::{
    ChatQueryExpander, GeocodingConfig, GeocodingLookup, Place, DEFAULT_PLACE_CATEGORIES,
};
pub use resources::{ResourceGenerator, ResourceTopic, StudyResource};
pub use scholarships::{
    Scholarship, ScholarshipCriteria, ScholarshipGenerator, ScholarshipVerifier, StudentProfile,
};
