pub mod documents;
pub mod status;
