pub mod checkdigit;

pub use checkdigit::{compute_check_digit, validate_all, validate_check};
