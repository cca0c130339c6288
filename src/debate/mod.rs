pub mod controller;
pub mod prompts;
pub mod result;
pub mod signals;
pub mod similarity;
pub mod transcript;
