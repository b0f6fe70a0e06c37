//! Invoicing service: invoice lifecycle, money totals, currency conversion,
//! PDF rendering, and audited email dispatch.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
