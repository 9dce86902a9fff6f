//! Wire-dialect helpers shared across service handlers.

pub mod aws_query;
