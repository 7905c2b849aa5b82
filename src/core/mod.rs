// Domain-layer modules and shared errors/models
pub mod derivation {
    pub use crate::derivation::*;
}

pub mod features {
    pub use crate::features::*;
}

pub mod validation {
    pub use crate::validation::*;
}

pub mod prediction {
    pub use crate::prediction::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
