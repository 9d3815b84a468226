pub mod electricity;
pub mod money;
pub(crate) mod number;
pub mod time;
