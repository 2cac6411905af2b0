//! Record store backends.

pub mod store {
    pub use crate::store::*;
}

pub mod pg_store {
    pub use crate::pg_store::*;
}

pub mod rest_store {
    pub use crate::rest_store::*;
}

pub mod memory_store {
    pub use crate::memory_store::*;
}
