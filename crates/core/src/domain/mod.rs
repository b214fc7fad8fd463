pub mod alert;
pub mod change;
pub mod quote;
