pub mod card;
pub mod review;
pub mod word;

pub use card::{Card, CardState, LanguageCode, WordContent};
pub use review::{ReviewButton, ReviewLog};
pub use word::RawWord;
