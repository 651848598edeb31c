mod census;
mod inline;
mod optimize;

pub use optimize::optimize;
