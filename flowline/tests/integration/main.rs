// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod common;
mod controller_lifecycle;
mod flow_combination;
mod flow_conservation;
mod flow_operator;
mod flow_ordering;
mod flow_source;
#[cfg(feature = "serde")]
mod model_serde;
