//! External collaborators: the trained model and the historical dataset.

pub mod classifier {
    pub use crate::classifier::*;
}

pub mod dataset {
    pub use crate::dataset::*;
}
