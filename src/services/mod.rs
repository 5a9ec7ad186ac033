pub mod catalog;
pub mod library;
pub mod progress;

pub use library::SeriesLibrary;
pub use progress::{ContinueWatching, ProgressReconciler, ReconcileOptions};
