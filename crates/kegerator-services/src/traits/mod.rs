/*!
Service trait definitions.

These traits define the stable application boundary between
transport adapters and the state layer.
*/

pub mod keg_service;

pub use keg_service::KegService;
