// Domain-layer modules and shared errors/models
pub mod engine {
    pub use crate::engine::*;
}

pub mod phone {
    pub use crate::phone::*;
}

pub mod dq {
    pub use crate::dq::*;
}

pub mod legacy {
    pub use crate::legacy::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
