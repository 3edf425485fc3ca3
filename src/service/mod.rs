//! Services over the SQL builder: conversion, CRUD execution, paging, audit, dashboard.

pub mod audit;
pub mod convert;
mod crud;
pub mod dashboard;
pub mod paging;
pub use crud::CrudRepository;
