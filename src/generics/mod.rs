//! Generics: substitution, monomorphization, constraint validation, and
//! generic extension methods.

pub mod constraints;
pub mod extensions;
pub mod monomorphize;
pub mod substitute;

pub use constraints::ConstraintValidator;
pub use extensions::{mangle_extension_name, monomorphize_generic_extensions};
pub use monomorphize::{ensure_result_enum, Monomorphizer};
pub use substitute::{substitute_block, substitute_type, Substitution};

#[cfg(test)]
#[path = "generics_tests.rs"]
mod tests;
