pub mod check;
pub mod check_result;
pub mod homework;
pub mod solution;
