//! Command implementations

pub mod activity;

pub mod doctor;

pub mod info;
