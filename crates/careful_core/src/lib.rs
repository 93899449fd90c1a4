//! Skincare companion core: routines and their progress, product lookup,
//! favorites, the signed-in session and barcode scanning.

pub mod catalog;
pub mod conflicts;
pub mod favorites;
pub mod routines;
pub mod samples;
pub mod scan;
pub mod session;

pub use catalog::{ProductCatalog, SampleCatalog};
pub use conflicts::{conflict_warnings, detect_conflicts};
pub use favorites::FavoritesLibrary;
pub use routines::{steps_from_candidates, NewRoutine, ProgressInfo, RoutineStateManager};
pub use session::SessionContext;
