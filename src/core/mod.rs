// Domain-layer modules and shared errors
pub mod classification {
    pub use crate::classification::*;
}

pub mod extraction {
    pub use crate::extraction::*;
}

pub mod errors {
    pub use crate::errors::*;
}
