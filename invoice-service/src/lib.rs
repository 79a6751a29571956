//! Invoice Service - REST backend for customers, catalog items, and invoices.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
