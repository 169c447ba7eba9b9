//! Storage layer - database entity and options repository

pub mod entity;
pub mod mapper;
pub mod migrations;
pub mod repositories;
