/*!
Service implementations backed by `kegerator-state`.
*/

pub mod keg_service_impl;

pub use keg_service_impl::KegServiceImpl;
