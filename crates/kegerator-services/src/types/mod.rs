/*!
Service layer types: DTOs and errors.
*/

pub mod dtos;
pub mod errors;

pub use dtos::*;
pub use errors::*;
