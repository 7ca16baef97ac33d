//! Standard library bindings (ES5 §15)
//!
//! Every built-in here is installed by `bootstrap.rs` once the prototype
//! chain it hangs off of exists. Each submodule owns one global value's
//! constructor + prototype methods, grounded on the corresponding chapter of
//! `original_source/runtime` where the contract's exact edge cases (radix
//! parsing, array hole-skipping, `join`'s separator coercion, ...) came from.
//!
//! `Date`, `RegExp`, and `JSON` are bound at the contract boundary only
//! (construction + the handful of methods a generated caller actually
//! invokes) rather than ECMA-262's full locale/format grammar, matching the
//! distilled specification's non-goal for exact date/number formatting.

pub mod array_ctor;
pub mod boolean_ctor;
pub mod date_ctor;
pub mod error_ctor;
pub mod function_proto;
pub mod global_funcs;
pub mod json_mod;
pub mod math_mod;
pub mod number_ctor;
pub mod object_ctor;
pub mod regexp_ctor;
pub mod string_ctor;
pub(crate) mod support;
