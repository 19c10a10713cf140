//! Identity resolution: catalog record -> per-provider slug.

pub mod listing;
pub mod resolve;
pub mod score;
pub mod slug;

pub use listing::ListingMemo;
pub use resolve::{AcceptedMatch, IdentityResolver, ProbeOutcome, Resolution};
pub use score::{score_candidate, MatchOutcome};
pub use slug::{slug_variations, slugify};
