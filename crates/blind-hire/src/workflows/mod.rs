pub mod matching;
pub mod scores;
